//! Social network ingestion used by the harvest crawler.
//!
//! Only the Twitter/X timeline pipeline is implemented: source adapters fetch raw
//! pages, the extractor and normalizer turn them into [`twitter::Post`] records, and
//! the paginator bounds how far back each author is walked.
pub mod twitter;
