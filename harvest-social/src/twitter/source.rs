//! Source adapters: one uniform "fetch one page for an author" surface over
//! heterogeneous upstream providers.
//!
//! Every adapter wraps its upstream call in the configured [`RetryPolicy`] and paces
//! consecutive HTTP calls through a [`Pacer`]. Host/instance fallback happens inside a
//! single attempt, so a retry replays the whole primary → fallback sequence.
use super::error::IngestError;
use super::extract::extract;
use super::types::{Page, RawPage};
use async_trait::async_trait;
use dashmap::DashMap;
use harvest_config::{FetchConfig, SourceConfig};
use harvest_http::{
    Auth, HeaderMap, HeaderName, HeaderValue, HttpClient, HttpError, RequestOpts, RetryPolicy,
    with_retry,
};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

const USER_ID_PATHS: &[&str] = &[
    "/data/user/result/rest_id",
    "/result/rest_id",
    "/rest_id",
    "/id",
];

/// Uniform page-fetch surface over one upstream provider.
///
/// Precondition: upstream post ids increase with post chronology, so comparing ids
/// under [`PostId`](super::PostId) ordering approximates recency. Cursors are only
/// valid for the adapter instance and author that produced them.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Fetch one raw page; `cursor = None` requests the newest page.
    async fn fetch_raw(&self, handle: &str, cursor: Option<&str>) -> Result<RawPage, IngestError>;

    /// Fetch one page and split it into candidate entries plus the next cursor.
    async fn fetch_page(&self, handle: &str, cursor: Option<&str>) -> Result<Page, IngestError> {
        let raw = self.fetch_raw(handle, cursor).await?;
        Ok(extract(&raw))
    }
}

/// Timeouts, pacing and retry budget shared by all adapter variants.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub pacing: Duration,
    pub retry: RetryPolicy,
}

impl From<&FetchConfig> for FetchOptions {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            timeout: cfg.request_timeout(),
            pacing: cfg.pacing(),
            retry: RetryPolicy::new(
                cfg.retry.max_attempts,
                Duration::from_millis(cfg.retry.base_delay_ms),
                Duration::from_millis(cfg.retry.max_delay_ms),
            ),
        }
    }
}

/// Fixed minimum delay between consecutive upstream calls, successful or not.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until `min_interval` has passed since the previous call was released.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready = prev + self.min_interval;
            if ready > Instant::now() {
                tracing::trace!(
                    wait_ms = (ready - Instant::now()).as_millis() as u64,
                    "source.pacing"
                );
                sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Handle → upstream user id memo. Lives as long as its adapter; entries are
/// never evicted or invalidated.
#[derive(Debug, Default)]
pub struct HandleCache {
    ids: DashMap<String, String>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: &str) -> Option<String> {
        self.ids.get(&key(handle)).map(|id| id.value().clone())
    }

    pub fn insert(&self, handle: &str, id: impl Into<String>) {
        self.ids.insert(key(handle), id.into());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn key(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// `host` or `scheme://host[:port]` → `scheme://host[:port]`
fn origin(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn bare_host(origin: &str) -> &str {
    origin.split_once("://").map_or(origin, |(_, rest)| rest)
}

fn rapidapi_headers(origin: &str) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    let host = HeaderValue::from_str(bare_host(origin))
        .map_err(|e| HttpError::Build(format!("invalid x-rapidapi-host header: {e}")))?;
    headers.insert(HeaderName::from_static("x-rapidapi-host"), host);
    Ok(headers)
}

/// Paced, single-attempt HTTP access shared by the adapters; retries live one level up.
struct Fetcher {
    http: HttpClient,
    opts: FetchOptions,
    pacer: Pacer,
}

impl Fetcher {
    fn new(first_origin: &str, opts: FetchOptions) -> Result<Self, IngestError> {
        let http = HttpClient::new(first_origin)
            .map_err(|e| IngestError::Config(e.to_string()))?
            .with_timeout(opts.timeout)
            .with_retry_policy(RetryPolicy::none());
        Ok(Self {
            http,
            opts,
            pacer: Pacer::new(opts.pacing),
        })
    }

    fn request<'a>(
        &self,
        query: Vec<(&'a str, Cow<'a, str>)>,
        auth: Option<Auth<'a>>,
        headers: HeaderMap,
    ) -> RequestOpts<'a> {
        RequestOpts {
            timeout: Some(self.opts.timeout),
            retries: Some(0),
            auth,
            headers: Some(headers),
            query: (!query.is_empty()).then_some(query),
            allow_absolute: true,
        }
    }

    async fn get_json(&self, url: &str, opts: RequestOpts<'_>) -> Result<Value, HttpError> {
        self.pacer.wait().await;
        self.http.get_json(url, opts).await
    }

    async fn get_text(&self, url: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        self.pacer.wait().await;
        self.http.get_text(url, opts).await
    }
}

fn no_hosts() -> HttpError {
    HttpError::Build("no upstream hosts configured".into())
}

/// Flat RapidAPI timeline (`timeline.php`) provider.
pub struct RapidTimelineAdapter {
    fetcher: Fetcher,
    origin: String,
    auth: Auth<'static>,
    headers: HeaderMap,
}

impl RapidTimelineAdapter {
    pub fn new(api_key: &str, host: &str, opts: FetchOptions) -> Result<Self, IngestError> {
        let origin = origin(host);
        let auth = Auth::header("x-rapidapi-key", api_key)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        let headers = rapidapi_headers(&origin).map_err(|e| IngestError::Config(e.to_string()))?;
        Ok(Self {
            fetcher: Fetcher::new(&origin, opts)?,
            origin,
            auth,
            headers,
        })
    }

    async fn fetch_once(&self, handle: &str, cursor: Option<&str>) -> Result<Value, HttpError> {
        let url = format!("{}/timeline.php", self.origin);
        let mut query = vec![("screenname", Cow::Borrowed(handle))];
        if let Some(c) = cursor {
            query.push(("cursor", Cow::Borrowed(c)));
        }
        let opts = self
            .fetcher
            .request(query, Some(self.auth.clone()), self.headers.clone());
        self.fetcher.get_json(&url, opts).await
    }
}

#[async_trait]
impl SourceAdapter for RapidTimelineAdapter {
    fn name(&self) -> &'static str {
        "rapid_timeline"
    }

    async fn fetch_raw(&self, handle: &str, cursor: Option<&str>) -> Result<RawPage, IngestError> {
        tracing::debug!(author = handle, cursor = ?cursor, "source.fetch_page");
        let this = self;
        let value = with_retry(&self.fetcher.opts.retry, "source.fetch_page", move || {
            this.fetch_once(handle, cursor)
        })
        .await?;
        Ok(RawPage::Json(value))
    }
}

/// GraphQL-shaped provider: resolves handles to user ids, then pages the media timeline.
pub struct GraphqlAdapter {
    fetcher: Fetcher,
    origins: Vec<String>,
    auth: Auth<'static>,
    lookup_path: String,
    timeline_path: String,
    page_size: u32,
    cache: Arc<HandleCache>,
}

/// Endpoint layout of a GraphQL-style provider.
#[derive(Debug, Clone)]
pub struct GraphqlEndpoints {
    /// Ordered hosts: primary first, then fallbacks.
    pub hosts: Vec<String>,
    pub lookup_path: String,
    pub timeline_path: String,
    pub page_size: u32,
}

impl GraphqlAdapter {
    pub fn new(
        api_key: &str,
        endpoints: GraphqlEndpoints,
        opts: FetchOptions,
        cache: Arc<HandleCache>,
    ) -> Result<Self, IngestError> {
        let origins: Vec<String> = endpoints.hosts.iter().map(|h| origin(h)).collect();
        let first = origins
            .first()
            .ok_or_else(|| IngestError::Config("at least one host is required".into()))?;
        let auth = Auth::header("x-rapidapi-key", api_key)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        Ok(Self {
            fetcher: Fetcher::new(first, opts)?,
            auth,
            lookup_path: endpoints.lookup_path.trim_matches('/').to_string(),
            timeline_path: endpoints.timeline_path.trim_matches('/').to_string(),
            page_size: endpoints.page_size,
            origins,
            cache,
        })
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// Resolve `handle` to the provider's user id, consulting the cache first.
    pub async fn resolve(&self, handle: &str) -> Result<String, IngestError> {
        if let Some(id) = self.cache.get(handle) {
            tracing::trace!(author = handle, %id, "source.handle_cached");
            return Ok(id);
        }
        let query = [("username", handle.to_string())];
        let query = &query[..];
        let path = self.lookup_path.as_str();
        let this = self;
        let value = with_retry(&self.fetcher.opts.retry, "source.resolve_handle", move || {
            this.get_with_fallback(path, query)
        })
        .await?;

        let id = USER_ID_PATHS
            .iter()
            .find_map(|p| match value.pointer(p) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| IngestError::Resolve(format!("no user id returned for @{handle}")))?;

        tracing::debug!(author = handle, %id, "source.handle_resolved");
        self.cache.insert(handle, id.clone());
        Ok(id)
    }

    /// Try each host in order for one logical call; the last error wins.
    async fn get_with_fallback(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, HttpError> {
        let mut last_err = None;
        for (idx, origin) in self.origins.iter().enumerate() {
            let url = format!("{origin}/{path}");
            let pairs = query
                .iter()
                .map(|(k, v)| (*k, Cow::Borrowed(v.as_str())))
                .collect();
            let opts = self
                .fetcher
                .request(pairs, Some(self.auth.clone()), rapidapi_headers(origin)?);
            match self.fetcher.get_json(&url, opts).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if idx + 1 < self.origins.len() {
                        tracing::warn!(host = bare_host(origin), error = %err, "source.host_fallback");
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(no_hosts))
    }
}

#[async_trait]
impl SourceAdapter for GraphqlAdapter {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn fetch_raw(&self, handle: &str, cursor: Option<&str>) -> Result<RawPage, IngestError> {
        let user_id = self.resolve(handle).await?;
        tracing::debug!(author = handle, %user_id, cursor = ?cursor, "source.fetch_page");

        let mut query = vec![("user", user_id), ("count", self.page_size.to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        let query = query.as_slice();
        let path = self.timeline_path.as_str();
        let this = self;
        let value = with_retry(&self.fetcher.opts.retry, "source.fetch_page", move || {
            this.get_with_fallback(path, query)
        })
        .await?;
        Ok(RawPage::Json(value))
    }
}

/// HTML scraping over public Nitter instances.
pub struct NitterAdapter {
    fetcher: Fetcher,
    origins: Vec<String>,
    headers: HeaderMap,
}

impl NitterAdapter {
    pub fn new(instances: &[String], opts: FetchOptions) -> Result<Self, IngestError> {
        let origins: Vec<String> = instances.iter().map(|h| origin(h)).collect();
        let first = origins
            .first()
            .ok_or_else(|| IngestError::Config("at least one instance is required".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("user-agent"),
            HeaderValue::from_static(BROWSER_UA),
        );
        Ok(Self {
            fetcher: Fetcher::new(first, opts)?,
            origins,
            headers,
        })
    }

    async fn fetch_once(&self, handle: &str, cursor: Option<&str>) -> Result<String, HttpError> {
        let mut last_err = None;
        for (idx, origin) in self.origins.iter().enumerate() {
            let url = format!("{origin}/{handle}/media");
            let query = cursor
                .map(|c| vec![("cursor", Cow::Borrowed(c))])
                .unwrap_or_default();
            let opts = self.fetcher.request(query, None, self.headers.clone());
            match self.fetcher.get_text(&url, opts).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if idx + 1 < self.origins.len() {
                        tracing::warn!(instance = bare_host(origin), error = %err, "source.host_fallback");
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(no_hosts))
    }
}

#[async_trait]
impl SourceAdapter for NitterAdapter {
    fn name(&self) -> &'static str {
        "nitter"
    }

    async fn fetch_raw(&self, handle: &str, cursor: Option<&str>) -> Result<RawPage, IngestError> {
        tracing::debug!(author = handle, cursor = ?cursor, "source.fetch_page");
        let this = self;
        let body = with_retry(&self.fetcher.opts.retry, "source.fetch_page", move || {
            this.fetch_once(handle, cursor)
        })
        .await?;
        Ok(RawPage::Html(body))
    }
}

/// Build the configured adapter variant.
pub fn build_adapter(
    source: &SourceConfig,
    fetch: &FetchConfig,
) -> Result<Arc<dyn SourceAdapter>, IngestError> {
    let opts = FetchOptions::from(fetch);
    let adapter: Arc<dyn SourceAdapter> = match source {
        SourceConfig::RapidTimeline { api_key, host } => {
            Arc::new(RapidTimelineAdapter::new(api_key, host, opts)?)
        }
        SourceConfig::Graphql {
            api_key,
            hosts,
            lookup_path,
            timeline_path,
            page_size,
        } => Arc::new(GraphqlAdapter::new(
            api_key,
            GraphqlEndpoints {
                hosts: hosts.clone(),
                lookup_path: lookup_path.clone(),
                timeline_path: timeline_path.clone(),
                page_size: *page_size,
            },
            opts,
            Arc::new(HandleCache::new()),
        )?),
        SourceConfig::Nitter { instances } => Arc::new(NitterAdapter::new(instances, opts)?),
    };
    tracing::info!(
        source = adapter.name(),
        pacing_ms = opts.pacing.as_millis() as u64,
        max_attempts = opts.retry.max_attempts,
        "source.adapter_ready"
    );
    Ok(adapter)
}
