use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Upstream post identifier with a recency order.
///
/// ASCII decimal ids compare numerically (so `"99" < "100"`) and sort before any
/// other id. Non-decimal ids compare lexicographically among themselves. Equality
/// follows the same order, so `"007" == "7"`.
///
/// ```
/// use harvest_social::twitter::PostId;
///
/// assert!(PostId::from("1000") > PostId::from("999"));
/// assert!(PostId::from("abc") < PostId::from("abd"));
/// assert_eq!(PostId::from("0042"), PostId::from("42"));
/// assert!(PostId::from("99999") < PostId::from("1a"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn decimal_digits(&self) -> Option<&str> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = self.0.trim_start_matches('0');
        Some(if trimmed.is_empty() { "0" } else { trimmed })
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.decimal_digits(), other.decimal_digits()) {
            (Some(a), Some(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PostId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PostId {}

/// Canonical image-bearing post. Immutable once built and never built without media.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    id: PostId,
    author_handle: String,
    text: String,
    media_urls: Vec<String>,
    created_at: DateTime<Utc>,
    created_at_estimated: bool,
    permalink: String,
}

impl Post {
    /// Returns `None` when `media_urls` is empty or `id` is blank.
    pub fn new(
        id: PostId,
        author_handle: impl Into<String>,
        text: impl Into<String>,
        media_urls: Vec<String>,
        created_at: DateTime<Utc>,
        created_at_estimated: bool,
    ) -> Option<Self> {
        if media_urls.is_empty() || id.is_empty() {
            return None;
        }
        let author_handle = author_handle.into();
        let permalink = permalink(&author_handle, &id);
        Some(Self {
            id,
            author_handle,
            text: text.into(),
            media_urls,
            created_at,
            created_at_estimated,
            permalink,
        })
    }

    pub fn id(&self) -> &PostId {
        &self.id
    }

    pub fn author_handle(&self) -> &str {
        &self.author_handle
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn media_urls(&self) -> &[String] {
        &self.media_urls
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the upstream timestamp was missing or unparsable and `created_at`
    /// holds the parse time instead.
    pub fn created_at_estimated(&self) -> bool {
        self.created_at_estimated
    }

    pub fn permalink(&self) -> &str {
        &self.permalink
    }
}

/// Canonical status URL for a handle + id.
pub fn permalink(handle: &str, id: &PostId) -> String {
    format!("https://twitter.com/{}/status/{}", handle, id)
}

/// Per-author pagination state, alive for one `collect_*` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorCursorState {
    /// `None` means "first page".
    pub cursor: Option<String>,
    pub pages_fetched: u32,
    pub watermark_reached: bool,
}

/// Payload returned by a source adapter before extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPage {
    Json(Value),
    Html(String),
}

/// Candidate entries of one page plus the cursor for the next one.
///
/// `entries` are newest-first. `pinned` holds posts lifted out of timeline order
/// and never takes part in boundary detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entries: Vec<Value>,
    pub pinned: Vec<Value>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// A page with only a pinned post is still empty: it carries no timeline progress.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
