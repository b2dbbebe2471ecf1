//! Run orchestration over tracked authors.
//!
//! Authors are processed one after another: all pages, then all posts. Failures are
//! contained at the smallest scope that raised them. A classification or publish
//! failure costs one post, a fetch or registry failure costs one author, and neither
//! aborts the run.
use crate::collab::{
    Author, AuthorRegistry, AuthorUpdate, Classifier, PublishOutcome, PublishRequest, Publisher,
};
use crate::error::PipelineError;
use crate::stats::RunStats;
use chrono::{DateTime, Utc};
use harvest_config::CrawlConfig;
use harvest_llm::Classification;
use harvest_social::twitter::{normalize, Paginator, Post, PostId, SourceAdapter};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Text markers that make a relevant backfill post credible without an extracted prompt.
const PROMPT_MARKERS: [&str; 5] = ["--", "prompt", "negative", "artstation", "detailed"];

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub max_pages: u32,
    pub relevance_threshold: f64,
    /// Classify but never publish or touch the registry.
    pub dry_run: bool,
}

impl From<&CrawlConfig> for RunSettings {
    fn from(cfg: &CrawlConfig) -> Self {
        Self {
            max_pages: cfg.max_pages,
            relevance_threshold: cfg.relevance_threshold,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Incremental,
    Backfill,
    History,
}

pub struct Orchestrator {
    paginator: Paginator,
    registry: Arc<dyn AuthorRegistry>,
    classifier: Arc<dyn Classifier>,
    publisher: Arc<dyn Publisher>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        registry: Arc<dyn AuthorRegistry>,
        classifier: Arc<dyn Classifier>,
        publisher: Arc<dyn Publisher>,
        settings: RunSettings,
    ) -> Self {
        Self {
            paginator: Paginator::new(source),
            registry,
            classifier,
            publisher,
            settings,
        }
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Incremental run: new posts per author since its watermark.
    ///
    /// Only listing the authors can fail the run as a whole.
    pub async fn run(&self) -> Result<RunStats, PipelineError> {
        let authors = self.registry.list_authors().await?;
        tracing::info!(
            authors = authors.len(),
            dry_run = self.settings.dry_run,
            max_pages = self.settings.max_pages,
            "pipeline.run.started"
        );

        let mut stats = RunStats::default();
        for author in &authors {
            stats.authors_processed += 1;
            self.run_author(author, &mut stats).await;
        }
        stats.log_completed("run");
        Ok(stats)
    }

    async fn run_author(&self, author: &Author, stats: &mut RunStats) {
        let harvest = self
            .paginator
            .collect_new_posts(&author.handle, author.last_seen_id.as_ref(), self.settings.max_pages)
            .await;
        stats.pages_fetched += harvest.pages_fetched;
        stats.posts_found += count(harvest.posts.len());
        if let Some(err) = harvest.fetch_error() {
            tracing::error!(author = %author.handle, error = err, "pipeline.author.fetch_failed");
            stats.errors += 1;
        }

        let mut newest: Option<&PostId> = None;
        for post in &harvest.posts {
            self.process_post(&author.handle, Some(&author.id), post, Mode::Incremental, stats)
                .await;
            if newest.is_none_or(|n| post.id() > n) {
                newest = Some(post.id());
            }
        }

        // Forward-only: a candidate at or below the stored watermark is not written.
        let advance = newest
            .filter(|n| author.last_seen_id.as_ref().is_none_or(|prior| *n > prior))
            .cloned();

        if self.settings.dry_run {
            tracing::info!(
                author = %author.handle,
                watermark = ?advance.as_ref().map(PostId::as_str),
                "pipeline.author.dry_run"
            );
            return;
        }

        let update = AuthorUpdate {
            author_id: author.id.clone(),
            last_seen_id: advance.clone(),
            increment_fetch: true,
            increment_success: false,
        };
        if let Err(err) = self.registry.update_author(&update).await {
            tracing::error!(author = %author.handle, error = %err, "pipeline.author.update_failed");
            stats.errors += 1;
            return;
        }
        tracing::info!(
            author = %author.handle,
            posts = harvest.posts.len(),
            stop = %harvest.stop,
            watermark = ?advance.as_ref().map(PostId::as_str),
            "pipeline.author.done"
        );
    }

    /// Re-walk every author back to `since`, ignoring watermarks.
    ///
    /// Watermarks are never moved; only per-post success counters are recorded.
    pub async fn backfill(
        &self,
        since: DateTime<Utc>,
        max_pages: u32,
    ) -> Result<RunStats, PipelineError> {
        let authors = self.registry.list_authors().await?;
        tracing::info!(
            authors = authors.len(),
            since = %since,
            max_pages,
            dry_run = self.settings.dry_run,
            "pipeline.backfill.started"
        );

        let mut stats = RunStats::default();
        for author in &authors {
            stats.authors_processed += 1;
            let harvest = self
                .paginator
                .collect_since(&author.handle, since, max_pages)
                .await;
            stats.pages_fetched += harvest.pages_fetched;
            stats.posts_found += count(harvest.posts.len());
            if let Some(err) = harvest.fetch_error() {
                tracing::error!(author = %author.handle, error = err, "pipeline.author.fetch_failed");
                stats.errors += 1;
            }
            for post in &harvest.posts {
                self.process_post(&author.handle, Some(&author.id), post, Mode::Backfill, &mut stats)
                    .await;
            }
        }
        stats.log_completed("backfill");
        Ok(stats)
    }

    /// Process previously collected raw entries for one handle, outside the registry.
    ///
    /// Entries older than `cutoff` are dropped; duplicates by id are processed once.
    pub async fn process_history(
        &self,
        handle: &str,
        entries: &[Value],
        cutoff: DateTime<Utc>,
    ) -> RunStats {
        let mut stats = RunStats {
            authors_processed: 1,
            ..Default::default()
        };
        let mut seen = BTreeSet::new();
        let posts: Vec<Post> = entries
            .iter()
            .filter_map(|entry| normalize(entry, handle))
            .filter(|post| post.created_at() >= cutoff)
            .filter(|post| seen.insert(post.id().clone()))
            .collect();
        stats.posts_found = count(posts.len());
        tracing::info!(
            author = handle,
            entries = entries.len(),
            posts = posts.len(),
            cutoff = %cutoff,
            "pipeline.history.started"
        );

        for post in &posts {
            self.process_post(handle, None, post, Mode::History, &mut stats)
                .await;
        }
        stats.log_completed("history");
        stats
    }

    async fn process_post(
        &self,
        handle: &str,
        author_id: Option<&str>,
        post: &Post,
        mode: Mode,
        stats: &mut RunStats,
    ) {
        let verdict = match self.classifier.classify(post).await {
            Ok(verdict) => {
                stats.posts_classified += 1;
                verdict
            }
            Err(err) => {
                tracing::warn!(post = %post.id(), error = %err, "pipeline.post.classify_failed");
                stats.errors += 1;
                Classification::failure(&err)
            }
        };

        if !verdict.passes(self.settings.relevance_threshold) {
            tracing::debug!(
                post = %post.id(),
                confidence = verdict.confidence,
                reason = %verdict.reason,
                "pipeline.post.skipped"
            );
            return;
        }
        if mode == Mode::Backfill && is_ambiguous(post, &verdict) {
            tracing::info!(post = %post.id(), "pipeline.post.ambiguous");
            stats.ambiguous_skipped += 1;
            return;
        }
        stats.posts_relevant += 1;

        if self.settings.dry_run {
            tracing::info!(
                post = %post.id(),
                confidence = verdict.confidence,
                title = ?verdict.suggested_title,
                "pipeline.post.dry_run"
            );
            return;
        }

        let request = PublishRequest::for_post(post, handle, &verdict);
        match self.publisher.publish(&request).await {
            Ok(PublishOutcome::Created {
                id,
                images_count,
                failed_urls,
            }) => {
                stats.posts_published += 1;
                tracing::info!(
                    post = %post.id(),
                    published_id = %id,
                    images = images_count,
                    failed_images = failed_urls.len(),
                    "pipeline.post.published"
                );
                if let Some(author_id) = author_id {
                    let update = AuthorUpdate::success(author_id);
                    if let Err(err) = self.registry.update_author(&update).await {
                        tracing::warn!(author = handle, error = %err, "pipeline.author.update_failed");
                        stats.errors += 1;
                    }
                }
            }
            Ok(PublishOutcome::Duplicate { reason }) => {
                tracing::debug!(post = %post.id(), reason = %reason, "pipeline.post.duplicate");
                stats.duplicates_skipped += 1;
            }
            Ok(PublishOutcome::Rejected { error, failed_urls }) => {
                tracing::warn!(
                    post = %post.id(),
                    error = %error,
                    failed_images = failed_urls.len(),
                    "pipeline.post.rejected"
                );
                stats.publish_failures += 1;
            }
            Err(err) => {
                tracing::error!(post = %post.id(), error = %err, "pipeline.post.publish_failed");
                stats.errors += 1;
            }
        }
    }
}

fn is_ambiguous(post: &Post, verdict: &Classification) -> bool {
    if verdict.extracted_text.is_some() {
        return false;
    }
    let text = post.text().to_lowercase();
    !PROMPT_MARKERS.iter().any(|marker| text.contains(marker))
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
