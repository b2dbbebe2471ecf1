use harvest_http::{HttpError, RetryExhausted, Retryable};
use thiserror::Error;

/// Failures surfaced by source adapters and the extractor.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Retryable upstream failure that outlived the retry budget.
    #[error("transient fetch failure after {attempts} attempt(s): {message}")]
    TransientFetch { attempts: u32, message: String },
    /// Upstream answered with a non-retryable failure.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Payload matched none of the known page shapes.
    #[error("payload matched no known shape: {0}")]
    ShapeMismatch(String),
    /// Handle could not be resolved to an upstream user id.
    #[error("could not resolve handle: {0}")]
    Resolve(String),
    /// Adapter could not be built from its configuration.
    #[error("invalid source configuration: {0}")]
    Config(String),
}

impl IngestError {
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::TransientFetch { .. })
    }
}

impl From<RetryExhausted<HttpError>> for IngestError {
    fn from(err: RetryExhausted<HttpError>) -> Self {
        if err.last.is_transient() {
            IngestError::TransientFetch {
                attempts: err.attempts,
                message: err.last.to_string(),
            }
        } else {
            IngestError::Fetch(err.last.to_string())
        }
    }
}

/// Why an entry did not become a [`Post`](super::Post). Not an error: rejected entries
/// are dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no result payload")]
    NoResult,
    #[error("no core content")]
    NoContent,
    #[error("repost")]
    Repost,
    #[error("missing id")]
    MissingId,
    #[error("no photo attachments")]
    NoPhotos,
}
