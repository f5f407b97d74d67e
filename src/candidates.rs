//! Candidate Embedding Fetcher
//!
//! Resolves embedding vectors for a candidate set: per-paper cache first,
//! then one parallel batched gateway fetch for the remainder. Papers the
//! provider never embedded are simply absent from the result map — "not all
//! candidates get reranked" is expected behavior, not an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::cache::CacheStore;
use crate::config::EmbeddingConfig;
use crate::scholar::{PaperGateway, EMBEDDING_BATCH_FIELDS};

/// Fetches per-paper embeddings for reranking candidates.
pub struct EmbeddingFetcher {
    gateway: Arc<dyn PaperGateway>,
    cache: Arc<dyn CacheStore>,
    dimension: usize,
    cache_ttl: Duration,
}

impl EmbeddingFetcher {
    pub fn new(
        gateway: Arc<dyn PaperGateway>,
        cache: Arc<dyn CacheStore>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            gateway,
            cache,
            dimension: config.dimension,
            cache_ttl: Duration::from_secs(config.query_cache_ttl_secs),
        }
    }

    /// Resolve embeddings for `paper_ids`, keyed by paper id.
    ///
    /// Ids without a vector (unknown to the provider, never embedded, or
    /// embedded at the wrong dimension) are excluded from the map. A failed
    /// batch fetch degrades to whatever the cache already holds: embedding
    /// coverage is a ranking-quality concern, not a correctness one, and the
    /// pipeline's fallback branches handle an empty map.
    #[instrument(name = "candidates.fetch_embeddings", skip(self, paper_ids), fields(
        requested = paper_ids.len(),
        cached = tracing::field::Empty,
        resolved = tracing::field::Empty
    ))]
    pub async fn fetch_embeddings(&self, paper_ids: &[String]) -> HashMap<String, Vec<f32>> {
        let mut embeddings: HashMap<String, Vec<f32>> = HashMap::new();
        let mut uncached: Vec<String> = Vec::new();

        for id in paper_ids {
            match self.cached_vector(id).await {
                Some(vector) => {
                    embeddings.insert(id.clone(), vector);
                }
                None => uncached.push(id.clone()),
            }
        }
        tracing::Span::current().record("cached", embeddings.len());
        debug!(
            cached = embeddings.len(),
            uncached = uncached.len(),
            "embedding cache partition"
        );

        if !uncached.is_empty() {
            match self
                .gateway
                .get_papers_batch_parallel(&uncached, Some(EMBEDDING_BATCH_FIELDS))
                .await
            {
                Ok(papers) => {
                    for paper in papers {
                        let Some(vector) = paper.embedding_vector() else {
                            continue;
                        };
                        if vector.is_empty() {
                            continue;
                        }
                        if vector.len() != self.dimension {
                            warn!(
                                paper_id = %paper.paper_id,
                                expected = self.dimension,
                                actual = vector.len(),
                                "excluding embedding with wrong dimension"
                            );
                            continue;
                        }
                        let vector = vector.to_vec();
                        self.cache_vector(&paper.paper_id, &vector).await;
                        embeddings.insert(paper.paper_id, vector);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "batch embedding fetch failed, continuing with cached vectors");
                }
            }
        }

        tracing::Span::current().record("resolved", embeddings.len());
        embeddings
    }

    async fn cached_vector(&self, paper_id: &str) -> Option<Vec<f32>> {
        let key = Self::cache_key(paper_id);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "embedding cache read failed");
                return None;
            }
        };
        let vector: Vec<f32> = serde_json::from_str(&raw).ok()?;
        // Dimension may differ after an embedding-model change; refetch
        (vector.len() == self.dimension).then_some(vector)
    }

    async fn cache_vector(&self, paper_id: &str, vector: &[f32]) {
        let key = Self::cache_key(paper_id);
        match serde_json::to_string(vector) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, raw, self.cache_ttl).await {
                    warn!(error = %e, "embedding cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "embedding not cacheable"),
        }
    }

    fn cache_key(paper_id: &str) -> String {
        format!("s2:embedding:{}", paper_id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::scholar::MockScholarClient;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fetcher_with(
        gateway: MockScholarClient,
        dimension: usize,
    ) -> (EmbeddingFetcher, Arc<MockScholarClient>) {
        let gateway = Arc::new(gateway);
        let config = EmbeddingConfig {
            dimension,
            ..EmbeddingConfig::default()
        };
        let fetcher = EmbeddingFetcher::new(
            gateway.clone(),
            Arc::new(InMemoryCache::new()),
            &config,
        );
        (fetcher, gateway)
    }

    #[tokio::test]
    async fn test_fetch_resolves_batch_embeddings() {
        let mut gateway = MockScholarClient::new();
        gateway.add_embedding("p1", vec![1.0, 0.0]);
        gateway.add_embedding("p2", vec![0.0, 1.0]);
        let (fetcher, _) = fetcher_with(gateway, 2);

        let embeddings = fetcher.fetch_embeddings(&ids(&["p1", "p2", "p3"])).await;
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings["p1"], vec![1.0, 0.0]);
        assert!(!embeddings.contains_key("p3"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_vectors_excluded() {
        let mut gateway = MockScholarClient::new();
        gateway.add_embedding("good", vec![1.0, 0.0]);
        gateway.add_embedding("bad", vec![1.0, 0.0, 0.0]);
        let (fetcher, _) = fetcher_with(gateway, 2);

        let embeddings = fetcher.fetch_embeddings(&ids(&["good", "bad"])).await;
        assert_eq!(embeddings.len(), 1);
        assert!(embeddings.contains_key("good"));
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let mut gateway = MockScholarClient::new();
        gateway.add_embedding("p1", vec![1.0, 0.0]);
        let (fetcher, gateway) = fetcher_with(gateway, 2);

        let first = fetcher.fetch_embeddings(&ids(&["p1"])).await;
        let second = fetcher.fetch_embeddings(&ids(&["p1"])).await;
        assert_eq!(first, second);
        // Second call fully cache-resolved: no further batch call
        assert_eq!(gateway.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_candidate_sets_reuse_cache() {
        let mut gateway = MockScholarClient::new();
        gateway.add_embedding("p1", vec![1.0, 0.0]);
        gateway.add_embedding("p2", vec![0.0, 1.0]);
        let (fetcher, gateway) = fetcher_with(gateway, 2);

        fetcher.fetch_embeddings(&ids(&["p1"])).await;
        let merged = fetcher.fetch_embeddings(&ids(&["p1", "p2"])).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(gateway.batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_failure_degrades_to_cached_subset() {
        let mut gateway = MockScholarClient::new();
        gateway.fail_batch = true;
        let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCache::new());
        cache
            .set(
                &EmbeddingFetcher::cache_key("p1"),
                serde_json::to_string(&vec![1.0_f32, 0.0]).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let config = EmbeddingConfig {
            dimension: 2,
            ..EmbeddingConfig::default()
        };
        let fetcher = EmbeddingFetcher::new(Arc::new(gateway), cache, &config);

        let embeddings = fetcher.fetch_embeddings(&ids(&["p1", "p2"])).await;
        assert_eq!(embeddings.len(), 1);
        assert!(embeddings.contains_key("p1"));
    }

    #[tokio::test]
    async fn test_empty_input_skips_gateway() {
        let (fetcher, gateway) = fetcher_with(MockScholarClient::new(), 2);
        let embeddings = fetcher.fetch_embeddings(&[]).await;
        assert!(embeddings.is_empty());
        assert_eq!(gateway.batch_calls(), 0);
    }
}
