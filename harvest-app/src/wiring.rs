use anyhow::{Context, Result};
use harvest_common::observability::LogConfig;
use harvest_config::{HarvestConfig, LoggingConfig};
use harvest_pipeline::{BotApiClient, Orchestrator, RunSettings};
use harvest_social::twitter::{FetchOptions, build_adapter};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn log_config(cfg: &LoggingConfig) -> LogConfig {
    LogConfig {
        app_name: "harvest",
        log_dir: cfg.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.stderr,
        format: cfg.format,
        default_filter: cfg.filter.clone(),
        keep_files: (cfg.keep_files > 0).then_some(cfg.keep_files),
    }
}

/// Build the orchestrator with the configured source, classifier and bot API.
pub fn build_orchestrator(cfg: &HarvestConfig, settings: RunSettings) -> Result<Orchestrator> {
    let source = build_adapter(&cfg.source, &cfg.fetch).context("building source adapter")?;
    let classifier =
        Arc::new(harvest_llm::build_classifier(&cfg.classifier).context("building classifier")?);

    let retry = FetchOptions::from(&cfg.fetch).retry;
    let bot = Arc::new(BotApiClient::new(&cfg.bot_api, retry).context("building bot api client")?);

    tracing::info!(
        source = source.name(),
        classifier = classifier.model_name(),
        bot_api = %cfg.bot_api.base_url,
        dry_run = settings.dry_run,
        "harvest.wired"
    );
    Ok(Orchestrator::new(
        source,
        bot.clone(),
        classifier,
        bot,
        settings,
    ))
}

pub fn save_raw(path: &Path, entries: &[Value]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), entries)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = entries.len(), "harvest.raw_saved");
    Ok(())
}

pub fn load_raw(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let entries: Vec<Value> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a JSON array of entries", path.display()))?;
    tracing::info!(path = %path.display(), entries = entries.len(), "harvest.raw_loaded");
    Ok(entries)
}
