//! Tracing bootstrap for the harvest binary and integration tests.
//!
//! Events go to a dated file under the log directory (one file per UTC day,
//! pruned to the configured retention) and optionally to stderr. Crawls talk to
//! several HTTP hosts and parse HTML, so the transport and parser crates are
//! held at `warn` unless the filter names them explicitly.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Environment variable consulted when no explicit log directory is given.
pub const LOG_DIR_ENV: &str = "HARVEST_LOG_DIR";

/// Dependency targets demoted to `warn` unless the filter mentions them.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "html5ever", "selectors"];

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used as the file prefix and the default directory name.
    pub app_name: &'static str,
    /// Explicit directory; otherwise `HARVEST_LOG_DIR`, then `~/.local/share/<app_name>`.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Daily files kept on disk; `None` keeps everything.
    pub keep_files: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "harvest",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
            keep_files: Some(14),
        }
    }
}

/// Install the global subscriber and return today's log file.
///
/// Only the first call installs anything; later calls return the same path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let mut builder = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.app_name)
        .filename_suffix("log");
    if let Some(keep) = config.keep_files.filter(|n| *n > 0) {
        builder = builder.max_log_files(keep);
    }
    let appender = builder
        .build(&dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter_directives(&config.default_filter))
            .with_context(|| format!("invalid log filter: {}", config.default_filter))?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match config.format {
        LogFormat::Text => {
            layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
            if config.emit_stderr {
                layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
            }
        }
        LogFormat::Json => {
            layers.push(fmt::layer().json().with_writer(writer).boxed());
            if config.emit_stderr {
                layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;
    let _ = LOG_GUARD.set(guard);

    let path = dir.join(daily_file_name(config.app_name, Utc::now()));
    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

/// Base filter plus a `warn` cap for each noisy dependency it does not mention.
fn filter_directives(base: &str) -> String {
    let mut directives: Vec<String> = base
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    for target in NOISY_TARGETS {
        let named = directives
            .iter()
            .any(|d| d.split('=').next().is_some_and(|t| t == *target || t.starts_with(&format!("{target}::"))));
        if !named {
            directives.push(format!("{target}=warn"));
        }
    }
    directives.join(",")
}

/// Matches the `prefix.YYYY-MM-DD.suffix` naming of the daily appender.
fn daily_file_name(app_name: &str, now: chrono::DateTime<Utc>) -> String {
    format!("{app_name}.{}.log", now.format("%Y-%m-%d"))
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
        .map(|dir| expand_home(&dir))
        .unwrap_or_else(|| match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".local/share").join(app_name),
            None => PathBuf::from(".").join(app_name),
        })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
