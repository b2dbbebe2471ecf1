use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use harvest_common::observability::init_logging;
use harvest_config::{HarvestConfig, HarvestConfigLoader};
use harvest_pipeline::RunSettings;
use harvest_social::twitter::StopReason;
use std::path::PathBuf;

mod wiring;

/// Incremental ingestion of image posts from tracked authors.
#[derive(Debug, Parser)]
#[command(name = "harvest", version)]
struct Cli {
    /// Configuration file (YAML); `HARVEST__*` variables override it.
    #[arg(long, short, default_value = "harvest.yaml", env = "HARVEST_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch posts newer than each author's watermark.
    Run {
        /// Override `crawl.max_pages`.
        #[arg(long)]
        max_pages: Option<u32>,
        /// Classify only: no publishing, no registry updates.
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-walk every author over the last N days without moving watermarks.
    Backfill {
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 10)]
        max_pages: u32,
        #[arg(long)]
        dry_run: bool,
    },
    /// Crawl one handle's history, optionally via a saved raw dump.
    History {
        handle: String,
        #[arg(long, default_value_t = 10)]
        days: i64,
        /// 1-based page to start collecting at; earlier pages only supply cursors.
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        #[arg(long, default_value_t = 10)]
        max_pages: u32,
        /// Write fetched raw entries to this JSON file.
        #[arg(long)]
        save_raw: Option<PathBuf>,
        /// Read raw entries from this JSON file instead of fetching.
        #[arg(long, conflicts_with = "start_page")]
        load_raw: Option<PathBuf>,
        /// Stop after fetching (pair with --save-raw).
        #[arg(long)]
        fetch_only: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config first: it decides where logs go.
    let cfg: HarvestConfig = HarvestConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let log_path = init_logging(wiring::log_config(&cfg.logging))?;
    tracing::info!(log = %log_path.display(), "harvest.start");

    let mut settings = RunSettings::from(&cfg.crawl);
    match cli.command {
        Command::Run { max_pages, dry_run } => {
            if let Some(max_pages) = max_pages {
                settings.max_pages = max_pages;
            }
            settings.dry_run = dry_run;
            let orchestrator = wiring::build_orchestrator(&cfg, settings)?;
            let stats = orchestrator.run().await?;
            println!("{stats}");
        }
        Command::Backfill {
            days,
            max_pages,
            dry_run,
        } => {
            settings.dry_run = dry_run;
            let orchestrator = wiring::build_orchestrator(&cfg, settings)?;
            let since = Utc::now() - chrono::Duration::days(days);
            let stats = orchestrator.backfill(since, max_pages).await?;
            println!("{stats}");
        }
        Command::History {
            handle,
            days,
            start_page,
            max_pages,
            save_raw,
            load_raw,
            fetch_only,
            dry_run,
        } => {
            settings.dry_run = dry_run;
            let orchestrator = wiring::build_orchestrator(&cfg, settings)?;
            let handle = handle.trim_start_matches('@').to_string();

            let entries = match load_raw {
                Some(path) => wiring::load_raw(&path)?,
                None => {
                    let raw = orchestrator
                        .paginator()
                        .collect_raw_entries(&handle, start_page, max_pages)
                        .await;
                    if let StopReason::FetchFailed(err) = &raw.stop {
                        tracing::warn!(author = %handle, error = %err, "harvest.history.partial");
                    }
                    raw.entries
                }
            };
            if let Some(path) = save_raw {
                wiring::save_raw(&path, &entries)?;
            }
            if fetch_only {
                println!("Fetched {} raw entries for @{handle}", entries.len());
                return Ok(());
            }

            let cutoff = Utc::now() - chrono::Duration::days(days);
            let stats = orchestrator
                .process_history(&handle, &entries, cutoff)
                .await;
            println!("{stats}");
        }
    }
    Ok(())
}
