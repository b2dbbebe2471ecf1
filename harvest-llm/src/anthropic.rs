//! Anthropic Messages API client.
use crate::openai::with_trailing_slash;
use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use harvest_common::{HarvestError, Result};
use harvest_http::{Auth, HeaderMap, HeaderName, HeaderValue, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    client: HttpClient,
    auth: Auth<'static>,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [UserMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: String, base_url: Option<&str>) -> Result<Self> {
        let base = with_trailing_slash(base_url.unwrap_or(ANTHROPIC_API_BASE));
        let client = HttpClient::new(&base)
            .map_err(|e| HarvestError::Client(format!("HttpClient init failed: {e}")))?
            .with_timeout(Duration::from_secs(60));
        let auth = Auth::header("x-api-key", api_key)
            .map_err(|e| HarvestError::Config(e.to_string()))?;
        Ok(Self {
            client,
            auth,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let req = MessagesRequest {
            model: &self.model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: system_prompt,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        let opts = RequestOpts {
            auth: Some(self.auth.clone()),
            headers: Some(headers),
            ..Default::default()
        };

        let resp: MessagesResponse = self
            .client
            .post_json_opts("messages", &req, opts)
            .await
            .map_err(|e| HarvestError::Provider(e.to_string()))?;

        let text: String = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(HarvestError::Provider("message had no text content".into()));
        }

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
