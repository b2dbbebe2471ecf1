//! HTTP collaborator backing both the author registry and the publishing service.
//!
//! Endpoints (all authenticated with `x-api-key`):
//! - `GET   api/bot/creators`  tracked authors with their watermark
//! - `PATCH api/bot/creators`  watermark and counter updates
//! - `POST  api/bot/prompts`   create-or-skip a published entry
use crate::collab::{
    Author, AuthorRegistry, AuthorUpdate, PublishOutcome, PublishRequest, Publisher,
};
use crate::error::PipelineError;
use async_trait::async_trait;
use harvest_common::{HarvestError, Result as HarvestResult};
use harvest_config::BotApiConfig;
use harvest_http::{
    with_retry, Auth, HttpClient, HttpError, Method, RequestOpts, RetryExhausted, RetryPolicy,
    StatusCode,
};
use harvest_social::twitter::PostId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const CREATORS_PATH: &str = "api/bot/creators";
const PROMPTS_PATH: &str = "api/bot/prompts";

pub struct BotApiClient {
    http: HttpClient,
    auth: Auth<'static>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct CreatorsResponse {
    #[serde(default)]
    creators: Vec<CreatorWire>,
}

#[derive(Debug, Deserialize)]
struct CreatorWire {
    id: Value,
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    last_tweet_id: Option<String>,
}

impl From<CreatorWire> for Author {
    fn from(w: CreatorWire) -> Self {
        let id = match w.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Author {
            id,
            handle: w.username,
            display_name: w.display_name,
            last_seen_id: w
                .last_tweet_id
                .filter(|s| !s.trim().is_empty())
                .map(PostId::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatorPatch<'a> {
    creator_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_tweet_id: Option<&'a str>,
    increment_fetch: bool,
    increment_success: bool,
}

#[derive(Debug, Serialize)]
struct PromptBody<'a> {
    title: &'a str,
    prompt_text: &'a str,
    image_urls: &'a [String],
    author_name: &'a str,
    source: &'static str,
    is_published: bool,
    is_featured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> From<&'a PublishRequest> for PromptBody<'a> {
    fn from(r: &'a PublishRequest) -> Self {
        Self {
            title: &r.title,
            prompt_text: &r.body_text,
            image_urls: &r.media_urls,
            author_name: &r.author_handle,
            source: "twitter",
            is_published: true,
            is_featured: false,
            negative_prompt: r.negative_text.as_deref(),
            model: r.model.as_deref(),
            description: r.description.as_deref(),
        }
    }
}

impl BotApiClient {
    pub fn new(config: &BotApiConfig, retry: RetryPolicy) -> HarvestResult<Self> {
        let base = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };
        let http = HttpClient::new(&base)
            .map_err(|e| HarvestError::Client(format!("bot api client: {e}")))?
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retry_policy(RetryPolicy::none());
        let auth = Auth::header("x-api-key", &config.api_key)
            .map_err(|e| HarvestError::Config(e.to_string()))?;
        Ok(Self { http, auth, retry })
    }

    fn opts(&self) -> RequestOpts<'static> {
        RequestOpts {
            auth: Some(self.auth.clone()),
            retries: Some(0),
            ..Default::default()
        }
    }
}

fn exhausted(e: RetryExhausted<HttpError>) -> String {
    format!("{} (after {} attempt(s))", e.last, e.attempts)
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn str_field<'v>(body: &'v Value, key: &str) -> Option<&'v str> {
    body.get(key).and_then(Value::as_str)
}

/// Interpret the prompts endpoint reply.
fn publish_outcome(status: StatusCode, body: &Value) -> Result<PublishOutcome, PipelineError> {
    let flag = |key: &str| body.get(key).and_then(Value::as_bool).unwrap_or(false);

    if status.is_success() {
        if flag("skipped") {
            return Ok(PublishOutcome::Duplicate {
                reason: str_field(body, "reason").unwrap_or("duplicate").to_string(),
            });
        }
        if status == StatusCode::CREATED || flag("success") {
            let id = match body.pointer("/prompt/id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let images_count = body
                .get("images_count")
                .and_then(Value::as_u64)
                .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX));
            return Ok(PublishOutcome::Created {
                id,
                images_count,
                failed_urls: string_list(&body["failed_urls"]),
            });
        }
    }
    if status == StatusCode::BAD_REQUEST {
        return Ok(PublishOutcome::Rejected {
            error: str_field(body, "error").unwrap_or("rejected").to_string(),
            failed_urls: string_list(&body["failed_urls"]),
        });
    }
    Err(PipelineError::Publish(format!(
        "unexpected reply {status}: {}",
        str_field(body, "error").unwrap_or("no error message")
    )))
}

#[async_trait]
impl AuthorRegistry for BotApiClient {
    async fn list_authors(&self) -> Result<Vec<Author>, PipelineError> {
        let this = self;
        let resp: CreatorsResponse = with_retry(&self.retry, "bot_api.list_creators", move || {
            this.http.get_json(CREATORS_PATH, this.opts())
        })
        .await
        .map_err(|e| PipelineError::Registry(exhausted(e)))?;
        let authors: Vec<Author> = resp.creators.into_iter().map(Author::from).collect();
        tracing::debug!(count = authors.len(), "bot_api.creators_listed");
        Ok(authors)
    }

    /// Not retried: counter increments are not idempotent.
    async fn update_author(&self, update: &AuthorUpdate) -> Result<(), PipelineError> {
        let body = CreatorPatch {
            creator_id: &update.author_id,
            last_tweet_id: update.last_seen_id.as_ref().map(PostId::as_str),
            increment_fetch: update.increment_fetch,
            increment_success: update.increment_success,
        };
        let resp = self
            .http
            .send_json(Method::PATCH, CREATORS_PATH, Some(&body), self.opts())
            .await
            .map_err(|e| PipelineError::Registry(e.to_string()))?;
        if !resp.status.is_success() {
            return Err(PipelineError::Registry(format!(
                "update {} rejected with {}: {}",
                update.author_id,
                resp.status,
                str_field(&resp.body, "error").unwrap_or("no error message")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for BotApiClient {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError> {
        let body = PromptBody::from(request);
        let this = self;
        let body_ref = &body;
        let resp = with_retry(&self.retry, "bot_api.create_prompt", move || {
            this.http
                .send_json(Method::POST, PROMPTS_PATH, Some(body_ref), this.opts())
        })
        .await
        .map_err(|e| PipelineError::Publish(exhausted(e)))?;
        publish_outcome(resp.status, &resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_reply() {
        let out = publish_outcome(
            StatusCode::CREATED,
            &json!({"success": true, "prompt": {"id": "p-1"}, "images_count": 2}),
        )
        .unwrap();
        assert_eq!(
            out,
            PublishOutcome::Created {
                id: "p-1".into(),
                images_count: 2,
                failed_urls: vec![]
            }
        );
    }

    #[test]
    fn skipped_reply_is_duplicate() {
        let out = publish_outcome(
            StatusCode::OK,
            &json!({"success": false, "skipped": true, "reason": "duplicate_source"}),
        )
        .unwrap();
        assert_eq!(
            out,
            PublishOutcome::Duplicate {
                reason: "duplicate_source".into()
            }
        );
    }

    #[test]
    fn bad_request_is_rejection_with_failed_urls() {
        let out = publish_outcome(
            StatusCode::BAD_REQUEST,
            &json!({"error": "All images failed to process", "failed_urls": ["u1", "u2"]}),
        )
        .unwrap();
        assert_eq!(
            out,
            PublishOutcome::Rejected {
                error: "All images failed to process".into(),
                failed_urls: vec!["u1".into(), "u2".into()]
            }
        );
    }

    #[test]
    fn unauthorized_is_an_error() {
        let err = publish_outcome(StatusCode::UNAUTHORIZED, &json!({"error": "Invalid API key"}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn creator_wire_maps_numeric_id_and_blank_watermark() {
        let wire: CreatorWire = serde_json::from_value(json!({
            "id": 7, "username": "artist", "last_tweet_id": ""
        }))
        .unwrap();
        let author = Author::from(wire);
        assert_eq!(author.id, "7");
        assert_eq!(author.handle, "artist");
        assert_eq!(author.last_seen_id, None);
    }
}
