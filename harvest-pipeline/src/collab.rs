//! Contracts for the services the orchestrator consumes.
//!
//! The orchestrator only sees these traits; [`crate::bot_api::BotApiClient`] is the
//! HTTP implementation and tests plug in in-memory fakes.
use crate::error::PipelineError;
use async_trait::async_trait;
use harvest_llm::{Classification, PostClassifier};
use harvest_social::twitter::{Post, PostId};
use serde::Serialize;

/// A tracked author and its persisted watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub last_seen_id: Option<PostId>,
}

/// Watermark and counter update for one author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorUpdate {
    pub author_id: String,
    /// `None` leaves the stored watermark untouched.
    pub last_seen_id: Option<PostId>,
    pub increment_fetch: bool,
    pub increment_success: bool,
}

impl AuthorUpdate {
    pub fn success(author_id: &str) -> Self {
        Self {
            author_id: author_id.to_string(),
            increment_success: true,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait AuthorRegistry: Send + Sync {
    async fn list_authors(&self) -> Result<Vec<Author>, PipelineError>;
    async fn update_author(&self, update: &AuthorUpdate) -> Result<(), PipelineError>;
}

/// One call per post. Implementations report failures instead of guessing a verdict.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, post: &Post) -> Result<Classification, PipelineError>;
}

#[async_trait]
impl Classifier for PostClassifier {
    async fn classify(&self, post: &Post) -> Result<Classification, PipelineError> {
        PostClassifier::classify(self, post.text(), post.media_urls().len())
            .await
            .map_err(|e| PipelineError::Classification(e.to_string()))
    }
}

/// Everything the publishing service needs to create an entry for a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRequest {
    pub title: String,
    pub body_text: String,
    pub media_urls: Vec<String>,
    pub author_handle: String,
    pub negative_text: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
}

impl PublishRequest {
    /// Map a classified post onto a publish request attributed to `handle`.
    pub fn for_post(post: &Post, handle: &str, verdict: &Classification) -> Self {
        Self {
            title: verdict
                .suggested_title
                .clone()
                .unwrap_or_else(|| format!("@{handle} prompt")),
            body_text: verdict
                .extracted_text
                .clone()
                .unwrap_or_else(|| post.text().to_string()),
            media_urls: post.media_urls().to_vec(),
            author_handle: handle.to_string(),
            negative_text: verdict.extracted_negative_text.clone(),
            model: verdict.suggested_model.clone(),
            description: Some(format!("Source: {}", post.permalink())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Created {
        id: String,
        images_count: u32,
        failed_urls: Vec<String>,
    },
    /// The service already holds this post; not an error.
    Duplicate { reason: String },
    /// Nothing was created, typically because every image failed to process.
    Rejected {
        error: String,
        failed_urls: Vec<String>,
    },
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str) -> Post {
        Post::new(
            PostId::from("1790"),
            "artist",
            text,
            vec!["https://pbs.twimg.com/media/a?format=jpg&name=large".into()],
            Utc::now(),
            false,
        )
        .unwrap()
    }

    fn verdict() -> Classification {
        Classification {
            is_relevant: true,
            confidence: 0.9,
            reason: "params".into(),
            extracted_text: None,
            extracted_negative_text: None,
            suggested_title: None,
            suggested_model: None,
        }
    }

    #[test]
    fn request_falls_back_to_post_text_and_handle_title() {
        let req = PublishRequest::for_post(&post("fox --ar 2:3"), "Artist", &verdict());
        assert_eq!(req.title, "@Artist prompt");
        assert_eq!(req.body_text, "fox --ar 2:3");
        assert_eq!(req.author_handle, "Artist");
        assert_eq!(
            req.description.as_deref(),
            Some("Source: https://twitter.com/artist/status/1790")
        );
        assert_eq!(req.media_urls.len(), 1);
    }

    #[test]
    fn request_prefers_extracted_fields() {
        let mut v = verdict();
        v.suggested_title = Some("Neon fox".into());
        v.extracted_text = Some("a neon fox".into());
        v.extracted_negative_text = Some("blurry".into());
        v.suggested_model = Some("flux-1.1-pro".into());
        let req = PublishRequest::for_post(&post("look at this"), "artist", &v);
        assert_eq!(req.title, "Neon fox");
        assert_eq!(req.body_text, "a neon fox");
        assert_eq!(req.negative_text.as_deref(), Some("blurry"));
        assert_eq!(req.model.as_deref(), Some("flux-1.1-pro"));
    }
}
