use thiserror::Error;

/// Failures of the collaborators the orchestrator talks to.
///
/// None of these abort a run: they are counted against the post or author that
/// triggered them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("classification failed: {0}")]
    Classification(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("author registry: {0}")]
    Registry(String),
}
