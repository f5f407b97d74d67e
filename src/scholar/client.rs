//! Metadata provider client: bulk search, batch fetch, citation graph.
//!
//! All network access to the paper metadata provider goes through
//! [`ScholarClient`]. The client is stateless apart from the injected cache
//! store and is safe to share behind `Arc` across concurrent requests.
//!
//! Resilience policy: transient conditions (HTTP 429, HTTP 503, network
//! timeout/connect failures) are retried with exponential backoff up to a
//! configured budget and surface as [`GatewayError::Unavailable`] once the
//! budget is exhausted. Every other HTTP error is permanent and surfaces
//! immediately as [`GatewayError::RequestFailed`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::types::{BulkSearchPage, CitationsPage, Paper, SearchQuery, SearchResults};
use crate::cache::{hashed_key, CacheStore};
use crate::config::ScholarConfig;

/// Default field projection for search and citation results
pub const DEFAULT_SEARCH_FIELDS: &str =
    "paperId,title,abstract,year,citationCount,venue,authors,openAccessPdf,externalIds";

/// Field projection for batch fetches that need paper embeddings
pub const EMBEDDING_BATCH_FIELDS: &str = "paperId,embedding.specter_v2";

// ============================================================================
// Errors
// ============================================================================

/// Provider gateway error
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Permanent provider rejection: 4xx other than 429. Not retried.
    #[error("provider request failed with HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// Transient failures exhausted the retry budget
    #[error("provider unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    /// Transport failure that is not retryable
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected schema
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Gateway trait
// ============================================================================

/// The provider operations the reranking pipeline depends on.
///
/// [`ScholarClient`] implements this for production;
/// [`super::MockScholarClient`] implements it for tests.
#[async_trait]
pub trait PaperGateway: Send + Sync {
    /// Paged bulk search, deduplicated by paper id, capped at `max_papers`.
    async fn search_all(
        &self,
        query: &SearchQuery,
        max_papers: usize,
    ) -> Result<SearchResults, GatewayError>;

    /// Chunked concurrent batch metadata fetch. Ids the provider does not
    /// know are omitted from the result, never an error.
    async fn get_papers_batch_parallel(
        &self,
        ids: &[String],
        fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError>;
}

// ============================================================================
// Client
// ============================================================================

/// Client for the bulk paper-search and batch-metadata provider
pub struct ScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache: Arc<dyn CacheStore>,
    config: ScholarConfig,
}

impl ScholarClient {
    /// Create a client from configuration with an injected cache store
    pub fn new(config: ScholarConfig, cache: Arc<dyn CacheStore>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("indagar/0.1 (https://github.com/paiml/indagar)")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            cache,
            config,
        }
    }

    /// Override the provider base URL (for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// First page of bulk search results (cached)
    pub async fn search(&self, query: &SearchQuery) -> Result<BulkSearchPage, GatewayError> {
        self.search_page(query, None).await
    }

    /// Page through bulk search until the provider is exhausted or
    /// `max_papers` candidates are collected. Pages are sequential because
    /// each continuation token comes from the previous page.
    #[instrument(name = "scholar.search_all", skip(self, query), fields(
        query = %query.query,
        max_papers,
        total = tracing::field::Empty,
        collected = tracing::field::Empty
    ))]
    pub async fn search_all(
        &self,
        query: &SearchQuery,
        max_papers: usize,
    ) -> Result<SearchResults, GatewayError> {
        let mut papers: Vec<Paper> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut token: Option<String> = None;
        let mut total: u64;

        loop {
            let page = self.search_page(query, token.as_deref()).await?;
            total = page.total;
            let page_empty = page.data.is_empty();
            let next_token = page.token;

            for paper in page.data {
                // Providers can overlap across pages; keep first occurrence
                if paper.paper_id.is_empty() || !seen.insert(paper.paper_id.clone()) {
                    continue;
                }
                papers.push(paper);
            }

            if papers.len() >= max_papers {
                break;
            }
            if total > 0 && papers.len() as u64 >= total {
                break;
            }
            if page_empty {
                break;
            }
            match next_token {
                Some(t) if !t.is_empty() => token = Some(t),
                _ => break,
            }
        }

        papers.truncate(max_papers);
        tracing::Span::current().record("total", total);
        tracing::Span::current().record("collected", papers.len());
        debug!(
            total,
            collected = papers.len(),
            "bulk search pagination complete"
        );
        Ok(SearchResults { total, papers })
    }

    /// Batch metadata fetch. Inputs larger than one chunk are fetched
    /// sequentially with a small inter-chunk delay; use
    /// [`Self::get_papers_batch_parallel`] for large candidate sets.
    #[instrument(name = "scholar.batch", skip(self, ids, fields), fields(
        requested = ids.len(),
        returned = tracing::field::Empty
    ))]
    pub async fn get_papers_batch(
        &self,
        ids: &[String],
        fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError> {
        let mut papers = Vec::with_capacity(ids.len());
        for (i, chunk) in ids.chunks(self.config.batch_chunk_size).enumerate() {
            if i > 0 && self.config.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
            papers.extend(self.batch_chunk(chunk, fields).await?);
        }
        tracing::Span::current().record("returned", papers.len());
        Ok(papers)
    }

    /// Batch metadata fetch with chunks issued concurrently, bounded by the
    /// configured in-flight budget. Result order is not meaningful; callers
    /// merge by paper id.
    #[instrument(name = "scholar.batch_parallel", skip(self, ids, fields), fields(
        requested = ids.len(),
        returned = tracing::field::Empty
    ))]
    pub async fn get_papers_batch_parallel(
        &self,
        ids: &[String],
        fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError> {
        if ids.is_empty() {
            tracing::Span::current().record("returned", 0_usize);
            return Ok(Vec::new());
        }

        let chunk_fetches: Vec<_> = ids
            .chunks(self.config.batch_chunk_size)
            .map(|chunk| self.batch_chunk(chunk, fields))
            .collect();
        let chunk_results: Vec<Result<Vec<Paper>, GatewayError>> = stream::iter(chunk_fetches)
            .buffer_unordered(self.config.batch_concurrency.max(1))
            .collect()
            .await;

        // One failed chunk must not discard papers other chunks already
        // returned; only a fully failed batch surfaces an error
        let mut papers = Vec::new();
        let mut succeeded = 0_usize;
        let mut first_error = None;
        for result in chunk_results {
            match result {
                Ok(chunk) => {
                    succeeded += 1;
                    papers.extend(chunk);
                }
                Err(e) => {
                    warn!(error = %e, "batch chunk failed, keeping remaining chunks");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if succeeded == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        tracing::Span::current().record("returned", papers.len());
        Ok(papers)
    }

    /// Fetch a single paper. Ids unknown to the provider return `None`.
    #[instrument(name = "scholar.get_paper", skip(self, fields))]
    pub async fn get_paper(
        &self,
        paper_id: &str,
        fields: Option<&str>,
    ) -> Result<Option<Paper>, GatewayError> {
        let url = format!(
            "{}/paper/{}?fields={}",
            self.base_url,
            urlencoding::encode(paper_id),
            fields.unwrap_or(DEFAULT_SEARCH_FIELDS),
        );
        match self.fetch_json::<Paper>(&url, "paper").await {
            Ok(paper) => Ok(Some(paper)),
            Err(GatewayError::RequestFailed { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Papers that cite `paper_id`
    #[instrument(name = "scholar.citations", skip(self))]
    pub async fn get_citations(
        &self,
        paper_id: &str,
        limit: usize,
    ) -> Result<Vec<Paper>, GatewayError> {
        self.citation_edges(paper_id, "citations", limit).await
    }

    /// Papers cited by `paper_id`
    #[instrument(name = "scholar.references", skip(self))]
    pub async fn get_references(
        &self,
        paper_id: &str,
        limit: usize,
    ) -> Result<Vec<Paper>, GatewayError> {
        self.citation_edges(paper_id, "references", limit).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// One cached page of bulk search
    #[instrument(name = "scholar.search", skip(self, query, token), fields(
        cache_hit = tracing::field::Empty,
        result_count = tracing::field::Empty
    ))]
    async fn search_page(
        &self,
        query: &SearchQuery,
        token: Option<&str>,
    ) -> Result<BulkSearchPage, GatewayError> {
        let cache_key = self.search_cache_key(query, token);

        match self.cache.get(&cache_key).await {
            Ok(Some(raw)) => {
                // A corrupt entry falls through to a fresh fetch
                if let Ok(page) = serde_json::from_str::<BulkSearchPage>(&raw) {
                    debug!(results = page.data.len(), "bulk search cache hit");
                    tracing::Span::current().record("cache_hit", true);
                    tracing::Span::current().record("result_count", page.data.len());
                    return Ok(page);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "search cache read failed"),
        }
        tracing::Span::current().record("cache_hit", false);

        let url = self.search_url(query, token);
        let page: BulkSearchPage = self.fetch_json(&url, "bulk search").await?;
        tracing::Span::current().record("result_count", page.data.len());

        match serde_json::to_string(&page) {
            Ok(raw) => {
                let ttl = Duration::from_secs(self.config.search_cache_ttl_secs);
                if let Err(e) = self.cache.set(&cache_key, raw, ttl).await {
                    warn!(error = %e, "search cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "search page not cacheable"),
        }

        Ok(page)
    }

    fn search_url(&self, query: &SearchQuery, token: Option<&str>) -> String {
        let mut url = format!(
            "{}/paper/search/bulk?query={}&fields={}&limit={}",
            self.base_url,
            urlencoding::encode(&query.to_provider_query()),
            DEFAULT_SEARCH_FIELDS,
            self.config.search_page_size,
        );
        if query.open_access_only {
            url.push_str("&openAccessPdf");
        }
        if let Some(token) = token {
            url.push_str("&token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    /// Deterministic cache key over the full canonicalized search parameters
    pub(crate) fn search_cache_key(&self, query: &SearchQuery, token: Option<&str>) -> String {
        let payload = format!(
            "{}|fields={}|limit={}|token={}",
            query.canonical(),
            DEFAULT_SEARCH_FIELDS,
            self.config.search_page_size,
            token.unwrap_or(""),
        );
        hashed_key("s2:search", &payload)
    }

    /// Single batch POST for one chunk of ids
    async fn batch_chunk(
        &self,
        ids: &[String],
        fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError> {
        let url = format!(
            "{}/paper/batch?fields={}",
            self.base_url,
            fields.unwrap_or(DEFAULT_SEARCH_FIELDS),
        );
        let body = serde_json::json!({ "ids": ids });

        let response = self
            .send_with_retry(|| self.client.post(&url).json(&body), "paper batch")
            .await?;

        // The provider emits null placeholders for unknown ids; drop them
        let entries: Vec<Option<Paper>> = response.json().await.map_err(|e| {
            GatewayError::InvalidResponse(format!("failed to parse paper batch response: {}", e))
        })?;
        Ok(entries.into_iter().flatten().collect())
    }

    async fn citation_edges(
        &self,
        paper_id: &str,
        edge: &str,
        limit: usize,
    ) -> Result<Vec<Paper>, GatewayError> {
        let url = format!(
            "{}/paper/{}/{}?fields={}&limit={}",
            self.base_url,
            urlencoding::encode(paper_id),
            edge,
            DEFAULT_SEARCH_FIELDS,
            limit,
        );
        let page: CitationsPage = self.fetch_json(&url, edge).await?;

        let papers: Vec<Paper> = page
            .data
            .into_iter()
            .filter_map(|entry| entry.citing_paper.or(entry.cited_paper))
            .filter(|paper| !paper.paper_id.is_empty())
            .collect();
        info!(paper_id, edge, count = papers.len(), "citation edges fetched");
        Ok(papers)
    }

    /// HTTP GET + retry + status check + JSON parse helper
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T, GatewayError> {
        let response = self.send_with_retry(|| self.client.get(url), context).await?;
        response.json().await.map_err(|e| {
            GatewayError::InvalidResponse(format!("failed to parse {} response: {}", context, e))
        })
    }

    /// Send a request, retrying transient failures with exponential backoff.
    ///
    /// Retryable: HTTP 429, HTTP 503, network timeout/connect errors.
    /// Everything else fails on the first attempt.
    async fn send_with_retry(
        &self,
        make_request: impl Fn() -> reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut attempt: u32 = 0;
        loop {
            let mut request = make_request();
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }

            let transient = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if is_retryable_status(status) {
                        format!("HTTP {}", status.as_u16())
                    } else {
                        let message = response.text().await.unwrap_or_default();
                        return Err(GatewayError::RequestFailed {
                            status: status.as_u16(),
                            message,
                        });
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => format!("network error: {}", e),
                Err(e) => return Err(GatewayError::Network(e)),
            };

            if attempt >= self.config.retry_max {
                return Err(GatewayError::Unavailable {
                    attempts: attempt + 1,
                    message: transient,
                });
            }

            let delay = self.config.retry_initial_delay_ms * 2_u64.pow(attempt);
            warn!(
                context,
                attempt = attempt + 1,
                delay_ms = delay,
                reason = %transient,
                "transient provider failure, retrying"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }
}

/// Transient HTTP statuses worth a retry: rate limiting and service
/// unavailability. Every other non-success status is a permanent rejection.
pub(crate) fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
}

#[async_trait]
impl PaperGateway for ScholarClient {
    async fn search_all(
        &self,
        query: &SearchQuery,
        max_papers: usize,
    ) -> Result<SearchResults, GatewayError> {
        ScholarClient::search_all(self, query, max_papers).await
    }

    async fn get_papers_batch_parallel(
        &self,
        ids: &[String],
        fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError> {
        ScholarClient::get_papers_batch_parallel(self, ids, fields).await
    }
}
