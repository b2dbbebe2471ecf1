//! Provider‑agnostic LLM integration for Harvest.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, concrete clients
//! for Anthropic and OpenAI-compatible chat APIs (OpenAI, DeepSeek, Qwen), and the
//! [`classifier::PostClassifier`] built on top of them.
//!
//! # Examples
//! ```no_run
//! use harvest_config::{ClassifierConfig, LlmProvider};
//! use harvest_llm::build_llm_client;
//!
//! let cfg = ClassifierConfig {
//!     provider: LlmProvider::Deepseek,
//!     api_key: "sk-demo".into(),
//!     model: None,
//!     base_url: None,
//!     max_tokens: 1024,
//! };
//! let client = build_llm_client(&cfg)?;
//! assert_eq!(client.model_name(), "deepseek-chat");
//! # Ok::<(), harvest_common::HarvestError>(())
//! ```
pub mod anthropic;
pub mod classifier;
pub mod openai;
pub mod traits;

use anthropic::AnthropicClient;
use harvest_common::{HarvestError, Result};
use harvest_config::{ClassifierConfig, LlmProvider};
use openai::OpenAiClient;
use std::sync::Arc;
use traits::LlmClient;

pub use classifier::{Classification, PostClassifier};

/// Build the configured provider client.
pub fn build_llm_client(config: &ClassifierConfig) -> Result<Arc<dyn LlmClient>> {
    if config.api_key.trim().is_empty() {
        return Err(HarvestError::Config(
            "classifier.api_key must not be empty".to_string(),
        ));
    }
    let model = config.model().to_string();
    let base_url = Some(config.base_url());
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Claude => Arc::new(AnthropicClient::new(&config.api_key, model, base_url)?),
        LlmProvider::Openai | LlmProvider::Deepseek | LlmProvider::Qwen => {
            Arc::new(OpenAiClient::new(config.api_key.clone(), model, base_url)?)
        }
    };
    tracing::info!(provider = ?config.provider, model = client.model_name(), "llm.client_ready");
    Ok(client)
}

/// [`PostClassifier`] over the configured provider.
pub fn build_classifier(config: &ClassifierConfig) -> Result<PostClassifier> {
    Ok(PostClassifier::new(
        build_llm_client(config)?,
        config.max_tokens,
    ))
}
