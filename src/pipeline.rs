//! Reranking Orchestrator
//!
//! The top-level search pipeline: bulk search and query embedding run
//! concurrently, candidate embeddings are merged in, and the similarity
//! engine produces the final ranking. Every degradation the pipeline can
//! recover from (query embedding unavailable, zero candidate embeddings) is
//! reported through [`RerankingStats::fallback_reason`] on a successful
//! result, never as an error — callers branch on `reranking_applied` to
//! detect degraded ranking quality.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::CacheStore;
use crate::candidates::EmbeddingFetcher;
use crate::config::{PipelineConfig, RerankConfig};
use crate::embedding::{HttpEmbeddingProvider, QueryEmbeddingService};
use crate::scholar::{GatewayError, Paper, PaperGateway, ScholarClient, SearchQuery};
use crate::similarity::{rerank_by_similarity, SimilarityError};

// ============================================================================
// Types
// ============================================================================

/// Pipeline error: only non-recoverable provider failures reach callers.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// Why reranking was not applied despite a successful search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    /// The embedding provider could not embed the query
    QueryEmbeddingFailed,
    /// No candidate paper had a usable embedding vector
    NoPaperEmbeddings,
}

/// A search request: filters plus optional overrides of the pipeline caps.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Keyword query and metadata filters
    pub query: SearchQuery,
    /// Override for the candidate cap (default from [`PipelineConfig`])
    pub max_papers: Option<usize>,
    /// Override for the result limit (default from [`PipelineConfig`])
    pub final_limit: Option<usize>,
}

impl SearchParams {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    pub fn with_max_papers(mut self, max_papers: usize) -> Self {
        self.max_papers = Some(max_papers);
        self
    }

    pub fn with_final_limit(mut self, final_limit: usize) -> Self {
        self.final_limit = Some(final_limit);
        self
    }
}

/// A paper in the ranked result. `similarity` is present exactly when
/// reranking was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPaper {
    #[serde(flatten)]
    pub paper: Paper,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// How the ranking was produced.
///
/// Invariant: `reranking_applied == fallback_reason.is_none()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankingStats {
    /// Candidate-set size before truncation
    pub total_searched: usize,

    /// Provider-reported total matches, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_available: Option<u64>,

    /// Candidates that had a usable embedding vector
    pub papers_with_embeddings: usize,

    pub reranking_applied: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

/// Result of [`RerankPipeline::search_with_reranking`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankedSearch {
    pub papers: Vec<RankedPaper>,
    pub stats: RerankingStats,
}

// ============================================================================
// Pipeline
// ============================================================================

/// The search + rerank coordination layer.
///
/// Owns no state: collaborators are injected once and every invocation is
/// independent, so one instance serves concurrent requests behind `Arc`.
pub struct RerankPipeline {
    gateway: Arc<dyn PaperGateway>,
    query_embedder: QueryEmbeddingService,
    fetcher: EmbeddingFetcher,
    config: PipelineConfig,
}

impl RerankPipeline {
    /// Assemble a pipeline from injected collaborators
    pub fn new(
        gateway: Arc<dyn PaperGateway>,
        query_embedder: QueryEmbeddingService,
        fetcher: EmbeddingFetcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            query_embedder,
            fetcher,
            config,
        }
    }

    /// Production wiring: real provider clients sharing one cache store.
    pub fn from_config(config: RerankConfig, cache: Arc<dyn CacheStore>) -> Self {
        let gateway: Arc<dyn PaperGateway> =
            Arc::new(ScholarClient::new(config.scholar.clone(), cache.clone()));
        let provider = Arc::new(HttpEmbeddingProvider::new(&config.embedding));
        let query_embedder =
            QueryEmbeddingService::new(provider, cache.clone(), &config.embedding);
        let fetcher = EmbeddingFetcher::new(gateway.clone(), cache, &config.embedding);
        Self::new(gateway, query_embedder, fetcher, config.pipeline)
    }

    /// Search, then rerank candidates by semantic similarity to the query.
    ///
    /// Degraded stages fall back to provider-relevance order with a
    /// [`FallbackReason`]; only search failure and similarity-engine
    /// contract violations surface as `Err`.
    #[instrument(name = "pipeline.search_with_reranking", skip(self, params), fields(
        query = %params.query.query,
        total_searched = tracing::field::Empty,
        reranking_applied = tracing::field::Empty
    ))]
    pub async fn search_with_reranking(
        &self,
        params: &SearchParams,
    ) -> Result<RerankedSearch, PipelineError> {
        let max_papers = params.max_papers.unwrap_or(self.config.max_papers);
        let final_limit = params.final_limit.unwrap_or(self.config.final_limit);

        // Fan-out: both branches settle before any branching logic runs.
        // The embedding branch cannot fail (None is its failure signal),
        // so join! never drops a partial search result.
        let (search_result, query_vector) = tokio::join!(
            self.gateway.search_all(&params.query, max_papers),
            self.query_embedder
                .generate_query_embedding(&params.query.query),
        );
        let results = search_result?;
        let total_searched = results.papers.len();
        tracing::Span::current().record("total_searched", total_searched);

        let Some(query_vector) = query_vector else {
            warn!("query embedding unavailable, returning provider order");
            return Ok(Self::fallback(
                results.papers,
                results.total,
                final_limit,
                0,
                FallbackReason::QueryEmbeddingFailed,
            ));
        };

        let ids: Vec<String> = results.papers.iter().map(|p| p.paper_id.clone()).collect();
        let embeddings = self.fetcher.fetch_embeddings(&ids).await;

        // Merge vectors onto the candidate set; candidates without a match
        // keep no embedding but stay in the set
        let candidates: Vec<Paper> = results
            .papers
            .into_iter()
            .map(|paper| match embeddings.get(&paper.paper_id) {
                Some(vector) => paper.with_embedding(vector.clone()),
                None => paper,
            })
            .collect();
        let papers_with_embeddings = embeddings.len();

        if papers_with_embeddings == 0 {
            warn!("no candidate embeddings available, returning provider order");
            return Ok(Self::fallback(
                candidates,
                results.total,
                final_limit,
                0,
                FallbackReason::NoPaperEmbeddings,
            ));
        }

        let ranked = rerank_by_similarity(&candidates, &query_vector, final_limit)?;
        let papers: Vec<RankedPaper> = ranked
            .into_iter()
            .map(|(paper, similarity)| RankedPaper {
                paper,
                similarity: Some(similarity),
            })
            .collect();

        tracing::Span::current().record("reranking_applied", true);
        info!(
            total_searched,
            papers_with_embeddings,
            returned = papers.len(),
            "semantic reranking applied"
        );
        Ok(RerankedSearch {
            papers,
            stats: RerankingStats {
                total_searched,
                total_available: Some(results.total),
                papers_with_embeddings,
                reranking_applied: true,
                fallback_reason: None,
            },
        })
    }

    /// Provider-relevance order truncated to `final_limit`, no similarities
    fn fallback(
        candidates: Vec<Paper>,
        total_available: u64,
        final_limit: usize,
        papers_with_embeddings: usize,
        reason: FallbackReason,
    ) -> RerankedSearch {
        let total_searched = candidates.len();
        tracing::Span::current().record("reranking_applied", false);
        let papers: Vec<RankedPaper> = candidates
            .into_iter()
            .take(final_limit)
            .map(|paper| RankedPaper {
                paper,
                similarity: None,
            })
            .collect();
        RerankedSearch {
            papers,
            stats: RerankingStats {
                total_searched,
                total_available: Some(total_available),
                papers_with_embeddings,
                reranking_applied: false,
                fallback_reason: Some(reason),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::EmbeddingConfig;
    use crate::embedding::{EmbeddingProvider, MockEmbeddingProvider};
    use crate::scholar::MockScholarClient;

    fn pipeline_with(
        gateway: MockScholarClient,
        provider: MockEmbeddingProvider,
    ) -> RerankPipeline {
        let gateway: Arc<dyn PaperGateway> = Arc::new(gateway);
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCache::new());
        let embedding_config = EmbeddingConfig {
            dimension: provider.dimension(),
            ..EmbeddingConfig::default()
        };
        let query_embedder = QueryEmbeddingService::new(
            Arc::new(provider),
            cache.clone(),
            &embedding_config,
        );
        let fetcher = EmbeddingFetcher::new(gateway.clone(), cache, &embedding_config);
        RerankPipeline::new(gateway, query_embedder, fetcher, PipelineConfig::default())
    }

    fn params(query: &str) -> SearchParams {
        SearchParams::new(SearchQuery::new(query))
    }

    #[tokio::test]
    async fn test_success_path_sets_similarities() {
        let mut gateway = MockScholarClient::new();
        gateway.add_papers(vec![Paper::new("a"), Paper::new("b")]);
        gateway.add_embedding("a", vec![0.0, 1.0]);
        gateway.add_embedding("b", vec![1.0, 0.0]);

        let pipeline = pipeline_with(gateway, MockEmbeddingProvider::new(vec![1.0, 0.0]));
        let result = pipeline.search_with_reranking(&params("q")).await.unwrap();

        assert!(result.stats.reranking_applied);
        assert_eq!(result.stats.fallback_reason, None);
        assert_eq!(result.stats.papers_with_embeddings, 2);
        assert_eq!(result.papers[0].paper.paper_id, "b");
        assert!(result.papers.iter().all(|p| p.similarity.is_some()));
    }

    #[tokio::test]
    async fn test_search_failure_propagates() {
        let mut gateway = MockScholarClient::new();
        gateway.fail_search = true;

        let pipeline = pipeline_with(gateway, MockEmbeddingProvider::new(vec![1.0, 0.0]));
        let result = pipeline.search_with_reranking(&params("q")).await;
        assert!(matches!(
            result,
            Err(PipelineError::Gateway(GatewayError::Unavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_falls_back() {
        let mut gateway = MockScholarClient::new();
        gateway.add_papers(vec![Paper::new("a"), Paper::new("b"), Paper::new("c")]);

        let pipeline = pipeline_with(
            gateway,
            MockEmbeddingProvider::new(vec![1.0, 0.0]).failing_with(401),
        );
        let result = pipeline.search_with_reranking(&params("q")).await.unwrap();

        assert!(!result.stats.reranking_applied);
        assert_eq!(
            result.stats.fallback_reason,
            Some(FallbackReason::QueryEmbeddingFailed)
        );
        // Provider order preserved, no similarities
        let ids: Vec<&str> = result
            .papers
            .iter()
            .map(|p| p.paper.paper_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(result.papers.iter().all(|p| p.similarity.is_none()));
    }

    #[tokio::test]
    async fn test_no_candidate_embeddings_falls_back() {
        let mut gateway = MockScholarClient::new();
        gateway.add_papers(vec![Paper::new("a"), Paper::new("b")]);
        // Batch endpoint knows neither paper's embedding

        let pipeline = pipeline_with(gateway, MockEmbeddingProvider::new(vec![1.0, 0.0]));
        let result = pipeline.search_with_reranking(&params("q")).await.unwrap();

        assert!(!result.stats.reranking_applied);
        assert_eq!(
            result.stats.fallback_reason,
            Some(FallbackReason::NoPaperEmbeddings)
        );
        assert_eq!(result.stats.papers_with_embeddings, 0);
    }

    #[tokio::test]
    async fn test_empty_search_result() {
        let pipeline = pipeline_with(
            MockScholarClient::new(),
            MockEmbeddingProvider::new(vec![1.0, 0.0]),
        );
        let result = pipeline.search_with_reranking(&params("q")).await.unwrap();

        assert!(result.papers.is_empty());
        assert_eq!(result.stats.total_searched, 0);
    }

    #[tokio::test]
    async fn test_final_limit_override() {
        let mut gateway = MockScholarClient::new();
        let papers: Vec<Paper> = (0..10).map(|i| Paper::new(format!("p{}", i))).collect();
        for paper in &papers {
            gateway.add_embedding(paper.paper_id.clone(), vec![1.0, i_f32(paper)]);
        }
        gateway.add_papers(papers);

        let pipeline = pipeline_with(gateway, MockEmbeddingProvider::new(vec![1.0, 0.0]));
        let request = params("q").with_final_limit(3);
        let result = pipeline.search_with_reranking(&request).await.unwrap();

        assert_eq!(result.papers.len(), 3);
        assert_eq!(result.stats.total_searched, 10);
    }

    fn i_f32(paper: &Paper) -> f32 {
        paper.paper_id[1..].parse::<f32>().unwrap() * 0.1
    }

    #[test]
    fn test_fallback_reason_wire_format() {
        let json = serde_json::to_string(&FallbackReason::QueryEmbeddingFailed).unwrap();
        assert_eq!(json, "\"QUERY_EMBEDDING_FAILED\"");
        let json = serde_json::to_string(&FallbackReason::NoPaperEmbeddings).unwrap();
        assert_eq!(json, "\"NO_PAPER_EMBEDDINGS\"");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = RerankingStats {
            total_searched: 5,
            total_available: Some(12),
            papers_with_embeddings: 4,
            reranking_applied: true,
            fallback_reason: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalSearched"], 5);
        assert_eq!(json["papersWithEmbeddings"], 4);
        assert_eq!(json["rerankingApplied"], true);
        assert!(json.get("fallbackReason").is_none());
    }
}
