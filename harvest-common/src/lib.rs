//! Types shared by every Harvest crate.
//!
//! Holds the setup-level error type used by client constructors and the
//! [`observability`] helpers that binaries and integration tests call once at
//! start-up. Domain errors live next to the code that raises them
//! (`harvest_social::IngestError`, `harvest_pipeline::PipelineError`).
//!
//! ```rust
//! use harvest_common::HarvestError;
//!
//! let err = HarvestError::Config("missing api key".into());
//! assert_eq!(err.to_string(), "Configuration error: missing api key");
//! ```

pub mod observability;

/// Errors raised while wiring clients and collaborators together.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A client could not be constructed or reported a setup failure.
    #[error("Client error: {0}")]
    Client(String),

    /// An upstream provider answered with something we could not use.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Anything bubbling up from glue code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`HarvestError`].
pub type Result<T> = std::result::Result<T, HarvestError>;
