//! Per-author pagination with bounded, resumable stop conditions.
//!
//! States are `FETCHING` → `STOPPED`. A run stops on the first of: page limit,
//! failed fetch, empty page, stop boundary (id watermark or date), missing cursor.
//! Entries are assumed newest-first, so the first post past the boundary ends the
//! page as well as the walk.
use super::normalize::normalize;
use super::source::SourceAdapter;
use super::types::{AuthorCursorState, Post, PostId};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Why pagination for an author ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EmptyPage,
    CursorExhausted,
    WatermarkReached,
    DateBoundary,
    PageLimit,
    /// The adapter gave up on a page after its own retries.
    FetchFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EmptyPage => f.write_str("empty_page"),
            StopReason::CursorExhausted => f.write_str("cursor_exhausted"),
            StopReason::WatermarkReached => f.write_str("watermark_reached"),
            StopReason::DateBoundary => f.write_str("date_boundary"),
            StopReason::PageLimit => f.write_str("page_limit"),
            StopReason::FetchFailed(_) => f.write_str("fetch_failed"),
        }
    }
}

/// Posts gathered for one author, newest-first per page, pages in fetch order.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub posts: Vec<Post>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

impl Harvest {
    /// Message of the fetch failure that ended pagination, if any.
    pub fn fetch_error(&self) -> Option<&str> {
        match &self.stop {
            StopReason::FetchFailed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Unnormalized entries gathered for offline processing.
#[derive(Debug, Clone)]
pub struct RawHarvest {
    pub entries: Vec<Value>,
    pub pages_fetched: u32,
    pub stop: StopReason,
}

/// Drives repeated page fetches against one [`SourceAdapter`].
#[derive(Clone)]
pub struct Paginator {
    source: Arc<dyn SourceAdapter>,
}

impl Paginator {
    pub fn new(source: Arc<dyn SourceAdapter>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn SourceAdapter> {
        &self.source
    }

    /// Collect posts newer than `last_seen_id`; `None` walks until another stop fires.
    ///
    /// Never fails: a fetch error ends the walk and is reported in [`Harvest::stop`].
    pub async fn collect_new_posts(
        &self,
        handle: &str,
        last_seen_id: Option<&PostId>,
        max_pages: u32,
    ) -> Harvest {
        self.walk(
            handle,
            max_pages,
            |post| last_seen_id.is_some_and(|seen| post.id() <= seen),
            StopReason::WatermarkReached,
        )
        .await
    }

    /// Collect posts created at or after `since`, ignoring the id watermark.
    pub async fn collect_since(
        &self,
        handle: &str,
        since: DateTime<Utc>,
        max_pages: u32,
    ) -> Harvest {
        self.walk(
            handle,
            max_pages,
            |post| post.created_at() < since,
            StopReason::DateBoundary,
        )
        .await
    }

    async fn walk<F>(
        &self,
        handle: &str,
        max_pages: u32,
        past_boundary: F,
        boundary_reason: StopReason,
    ) -> Harvest
    where
        F: Fn(&Post) -> bool,
    {
        let mut state = AuthorCursorState::default();
        let mut posts: Vec<Post> = Vec::new();
        let mut seen: BTreeSet<PostId> = BTreeSet::new();

        let stop = loop {
            if state.pages_fetched >= max_pages {
                break StopReason::PageLimit;
            }
            let page = match self.source.fetch_page(handle, state.cursor.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(
                        author = handle,
                        page = state.pages_fetched + 1,
                        error = %err,
                        "paginate.fetch_failed"
                    );
                    break StopReason::FetchFailed(err.to_string());
                }
            };
            state.pages_fetched += 1;

            if page.is_empty() {
                break StopReason::EmptyPage;
            }

            let before = posts.len();
            for entry in &page.entries {
                let Some(post) = normalize(entry, handle) else {
                    continue;
                };
                if past_boundary(&post) {
                    state.watermark_reached = true;
                    break;
                }
                if seen.insert(post.id().clone()) {
                    posts.push(post);
                }
            }
            // Pinned posts sit outside timeline order: kept when inside the boundary, never a stop signal.
            for entry in &page.pinned {
                let Some(post) = normalize(entry, handle) else {
                    continue;
                };
                if !past_boundary(&post) && seen.insert(post.id().clone()) {
                    posts.push(post);
                }
            }
            tracing::debug!(
                author = handle,
                page = state.pages_fetched,
                entries = page.entries.len(),
                accepted = posts.len() - before,
                "paginate.page"
            );

            if state.watermark_reached {
                break boundary_reason;
            }
            match page.next_cursor {
                Some(cursor) => state.cursor = Some(cursor),
                None => break StopReason::CursorExhausted,
            }
        };

        tracing::info!(
            author = handle,
            source = self.source.name(),
            pages = state.pages_fetched,
            posts = posts.len(),
            stop = %stop,
            "paginate.stopped"
        );
        Harvest {
            posts,
            pages_fetched: state.pages_fetched,
            stop,
        }
    }

    /// Collect raw entries for `max_pages` pages starting at 1-based `start_page`.
    ///
    /// Earlier pages are fetched only to follow their cursors. Entries are kept
    /// unnormalized so they can be saved and replayed.
    pub async fn collect_raw_entries(
        &self,
        handle: &str,
        start_page: u32,
        max_pages: u32,
    ) -> RawHarvest {
        let mut state = AuthorCursorState::default();
        let mut entries = Vec::new();
        let skip = start_page.saturating_sub(1);

        let stop = loop {
            let collected = state.pages_fetched.saturating_sub(skip);
            if state.pages_fetched >= skip && collected >= max_pages {
                break StopReason::PageLimit;
            }
            let page = match self.source.fetch_page(handle, state.cursor.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(author = handle, page = state.pages_fetched + 1, error = %err, "paginate.fetch_failed");
                    break StopReason::FetchFailed(err.to_string());
                }
            };
            state.pages_fetched += 1;
            let skipping = state.pages_fetched <= skip;

            if !skipping {
                if page.is_empty() {
                    break StopReason::EmptyPage;
                }
                tracing::info!(
                    author = handle,
                    page = state.pages_fetched,
                    entries = page.entries.len(),
                    "paginate.raw_page"
                );
                entries.extend(page.entries);
                entries.extend(page.pinned);
            }
            match page.next_cursor {
                Some(cursor) => state.cursor = Some(cursor),
                None => break StopReason::CursorExhausted,
            }
        };

        RawHarvest {
            entries,
            pages_fetched: state.pages_fetched,
            stop,
        }
    }
}
