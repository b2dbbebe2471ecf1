//! Run orchestration for Harvest.
//!
//! Ties the ingestion core in `harvest-social` to its collaborators:
//! - [`collab`] defines the author registry, classifier and publisher contracts.
//! - [`bot_api`] implements the registry and publisher over the bot HTTP API.
//! - [`orchestrator`] drives incremental runs, backfills and single-author history.
//! - [`stats`] aggregates run-wide counters.
pub mod bot_api;
pub mod collab;
pub mod error;
pub mod orchestrator;
pub mod stats;

pub use bot_api::BotApiClient;
pub use collab::{
    Author, AuthorRegistry, AuthorUpdate, Classifier, PublishOutcome, PublishRequest, Publisher,
};
pub use error::PipelineError;
pub use orchestrator::{Orchestrator, RunSettings};
pub use stats::RunStats;
