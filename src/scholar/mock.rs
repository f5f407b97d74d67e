//! Mock gateway for testing without network calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::client::{GatewayError, PaperGateway};
use super::types::{Paper, SearchQuery, SearchResults};

/// Mock gateway for testing without network calls.
///
/// Counts calls per operation so tests can assert that caching and fallback
/// branches skip the network.
#[derive(Debug, Default)]
pub struct MockScholarClient {
    /// Papers returned by `search_all`, in provider-relevance order
    pub search_results: Vec<Paper>,
    /// Provider-reported total; defaults to `search_results.len()`
    pub total: Option<u64>,
    /// Papers returned by the batch endpoint, keyed by paper id
    pub batch_papers: HashMap<String, Paper>,
    /// When set, `search_all` fails with `Unavailable`
    pub fail_search: bool,
    /// When set, the batch endpoint fails with `Unavailable`
    pub fail_batch: bool,
    search_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockScholarClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate set returned by `search_all`
    pub fn add_papers(&mut self, papers: Vec<Paper>) -> &mut Self {
        self.search_results = papers;
        self
    }

    /// Override the provider-reported total
    pub fn set_total(&mut self, total: u64) -> &mut Self {
        self.total = Some(total);
        self
    }

    /// Add a paper to the batch endpoint's responses
    pub fn add_batch_paper(&mut self, paper: Paper) -> &mut Self {
        self.batch_papers.insert(paper.paper_id.clone(), paper);
        self
    }

    /// Add a batch response carrying an embedding for `paper_id`
    pub fn add_embedding(&mut self, paper_id: impl Into<String>, vector: Vec<f32>) -> &mut Self {
        let paper_id = paper_id.into();
        self.add_batch_paper(Paper::new(paper_id).with_embedding(vector))
    }

    /// Number of `search_all` invocations
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of batch invocations
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> GatewayError {
        GatewayError::Unavailable {
            attempts: 4,
            message: "HTTP 503".to_string(),
        }
    }
}

#[async_trait]
impl PaperGateway for MockScholarClient {
    async fn search_all(
        &self,
        _query: &SearchQuery,
        max_papers: usize,
    ) -> Result<SearchResults, GatewayError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(Self::unavailable());
        }

        let mut papers = self.search_results.clone();
        papers.truncate(max_papers);
        let total = self.total.unwrap_or(self.search_results.len() as u64);
        Ok(SearchResults { total, papers })
    }

    async fn get_papers_batch_parallel(
        &self,
        ids: &[String],
        _fields: Option<&str>,
    ) -> Result<Vec<Paper>, GatewayError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch {
            return Err(Self::unavailable());
        }

        // Ids the provider does not know are omitted, matching the real
        // batch endpoint contract
        Ok(ids
            .iter()
            .filter_map(|id| self.batch_papers.get(id).cloned())
            .collect())
    }
}
