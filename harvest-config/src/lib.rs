//! Loader for crawler configuration with YAML + environment overlays.
//!
//! Sources are merged in order (files, inline YAML, then `HARVEST__`-prefixed
//! environment variables with `__` as the nesting separator). String values may
//! reference `${VAR}`; expansion is applied recursively, up to a fixed depth, after
//! merging. Every section except `source`, `classifier` and `bot_api` has defaults
//! matching the production crawler.
use config::{Config, ConfigError, Environment, File};
use harvest_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct HarvestConfig {
    pub version: Option<String>,
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    pub classifier: ClassifierConfig,
    pub bot_api: BotApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream provider; the tag is `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Flat `timeline.php` provider on RapidAPI.
    RapidTimeline {
        api_key: String,
        #[serde(default = "default_rapid_host")]
        host: String,
    },
    /// GraphQL-shaped timeline provider with handle → id resolution.
    Graphql {
        api_key: String,
        /// Ordered hosts; the first is primary, the rest are fallbacks.
        hosts: Vec<String>,
        #[serde(default = "default_lookup_path")]
        lookup_path: String,
        #[serde(default = "default_timeline_path")]
        timeline_path: String,
        #[serde(default = "default_page_size")]
        page_size: u32,
    },
    /// HTML scraping against public Nitter instances.
    Nitter {
        #[serde(default = "default_nitter_instances")]
        instances: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Fixed minimum delay between consecutive upstream calls.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            pacing_ms: default_pacing_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            relevance_threshold: default_relevance_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Claude,
    Openai,
    Deepseek,
    Qwen,
}

impl LlmProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude-sonnet-4-20250514",
            LlmProvider::Openai => "gpt-4o",
            LlmProvider::Deepseek => "deepseek-chat",
            LlmProvider::Qwen => "qwen-plus",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Claude => "https://api.anthropic.com/v1/",
            LlmProvider::Openai => "https://api.openai.com/v1/",
            LlmProvider::Deepseek => "https://api.deepseek.com/",
            LlmProvider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1/",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,
}

impl ClassifierConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotApiConfig {
    #[serde(default = "default_bot_api_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_bot_api_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Daily log files kept on disk; 0 keeps everything.
    #[serde(default = "default_keep_files")]
    pub keep_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            dir: None,
            stderr: true,
            filter: default_filter(),
            keep_files: default_keep_files(),
        }
    }
}

fn default_rapid_host() -> String {
    "twitter-api45.p.rapidapi.com".into()
}
fn default_lookup_path() -> String {
    "user".into()
}
fn default_timeline_path() -> String {
    "user-media".into()
}
fn default_page_size() -> u32 {
    20
}
fn default_nitter_instances() -> Vec<String> {
    vec!["nitter.privacydev.net".into(), "nitter.poast.org".into()]
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_pacing_ms() -> u64 {
    2_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_max_pages() -> u32 {
    5
}
fn default_relevance_threshold() -> f64 {
    0.7
}
fn default_classifier_max_tokens() -> u32 {
    1024
}
fn default_bot_api_url() -> String {
    "https://admin.vibeshotclub.com".into()
}
fn default_bot_api_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "info".into()
}
fn default_keep_files() -> usize {
    14
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct HarvestConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HarvestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestConfigLoader {
    /// Start with `HARVEST__` env overrides; add files or inline YAML on top.
    ///
    /// ```
    /// use harvest_config::{HarvestConfigLoader, SourceConfig};
    ///
    /// let config = HarvestConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "1"
    /// source: { kind: nitter }
    /// classifier: { provider: openai, api_key: "k" }
    /// bot_api: { api_key: "b" }
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(matches!(config.source, SourceConfig::Nitter { .. }));
    /// assert_eq!(config.crawl.max_pages, 5);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder();
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (env-only deployments).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use harvest_config::{HarvestConfigLoader, LlmProvider};
    ///
    /// unsafe { std::env::set_var("DOC_BOT_KEY", "injected-from-env"); }
    ///
    /// let config = HarvestConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// source: { kind: rapid_timeline, api_key: "rk" }
    /// classifier: { provider: deepseek, api_key: "dk" }
    /// bot_api: { api_key: "${DOC_BOT_KEY}" }
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.bot_api.api_key, "injected-from-env");
    /// assert_eq!(config.classifier.provider, LlmProvider::Deepseek);
    /// assert_eq!(config.classifier.model(), "deepseek-chat");
    ///
    /// unsafe { std::env::remove_var("DOC_BOT_KEY"); }
    /// ```
    pub fn load(self) -> Result<HarvestConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("HARVEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: HarvestConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        validate(&typed)?;
        Ok(typed)
    }
}

fn validate(cfg: &HarvestConfig) -> Result<(), ConfigError> {
    match &cfg.source {
        SourceConfig::Graphql { hosts, .. } if hosts.is_empty() => {
            return Err(ConfigError::Message(
                "source.hosts must list at least one host".into(),
            ));
        }
        SourceConfig::Nitter { instances } if instances.is_empty() => {
            return Err(ConfigError::Message(
                "source.instances must list at least one instance".into(),
            ));
        }
        _ => {}
    }
    if cfg.crawl.max_pages == 0 {
        return Err(ConfigError::Message("crawl.max_pages must be >= 1".into()));
    }
    if !(0.0..=1.0).contains(&cfg.crawl.relevance_threshold) {
        return Err(ConfigError::Message(
            "crawl.relevance_threshold must be within 0.0..=1.0".into(),
        ));
    }
    Ok(())
}
