use serde::Serialize;
use std::fmt;

/// Aggregate counters for one run; mutated only by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub authors_processed: u32,
    pub pages_fetched: u32,
    pub posts_found: u32,
    pub posts_classified: u32,
    pub posts_relevant: u32,
    pub posts_published: u32,
    pub duplicates_skipped: u32,
    /// Relevant posts skipped by the backfill ambiguity guard.
    pub ambiguous_skipped: u32,
    /// Publishing service refused the post (e.g. every image failed).
    pub publish_failures: u32,
    pub errors: u32,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.authors_processed += other.authors_processed;
        self.pages_fetched += other.pages_fetched;
        self.posts_found += other.posts_found;
        self.posts_classified += other.posts_classified;
        self.posts_relevant += other.posts_relevant;
        self.posts_published += other.posts_published;
        self.duplicates_skipped += other.duplicates_skipped;
        self.ambiguous_skipped += other.ambiguous_skipped;
        self.publish_failures += other.publish_failures;
        self.errors += other.errors;
    }

    pub(crate) fn log_completed(&self, mode: &str) {
        tracing::info!(
            mode,
            authors = self.authors_processed,
            pages = self.pages_fetched,
            found = self.posts_found,
            classified = self.posts_classified,
            relevant = self.posts_relevant,
            published = self.posts_published,
            duplicates = self.duplicates_skipped,
            ambiguous = self.ambiguous_skipped,
            publish_failures = self.publish_failures,
            errors = self.errors,
            "pipeline.run.completed"
        );
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Authors processed:  {}", self.authors_processed)?;
        writeln!(f, "Pages fetched:      {}", self.pages_fetched)?;
        writeln!(f, "Posts found:        {}", self.posts_found)?;
        writeln!(f, "Posts classified:   {}", self.posts_classified)?;
        writeln!(f, "Relevant posts:     {}", self.posts_relevant)?;
        writeln!(f, "Published:          {}", self.posts_published)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates_skipped)?;
        writeln!(f, "Ambiguous skipped:  {}", self.ambiguous_skipped)?;
        writeln!(f, "Publish failures:   {}", self.publish_failures)?;
        write!(f, "Errors:             {}", self.errors)
    }
}
