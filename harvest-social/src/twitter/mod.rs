//! Twitter/X timeline ingestion.
//!
//! Data flows `source` → `extract` → `normalize` → `paginate`. Every stage tolerates
//! upstream drift: unknown page shapes degrade to empty pages, malformed entries are
//! rejected one by one, and a failed page fetch only ends pagination for that author.
pub mod error;
pub mod extract;
mod html;
pub mod normalize;
pub mod paginate;
pub mod source;
mod timestamp;
pub mod types;

pub use error::{IngestError, Rejection};
pub use extract::{extract, extract_strict};
pub use normalize::{normalize, try_normalize};
pub use paginate::{Harvest, Paginator, RawHarvest, StopReason};
pub use source::{
    FetchOptions, GraphqlAdapter, GraphqlEndpoints, HandleCache, NitterAdapter, Pacer,
    RapidTimelineAdapter, SourceAdapter, build_adapter,
};
pub use types::{AuthorCursorState, Page, Post, PostId, RawPage};
