//! Query embedding service with caching and fallback-to-`None` semantics.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::provider::EmbeddingProvider;
use crate::cache::{hashed_key, CacheStore};
use crate::config::EmbeddingConfig;

/// Obtains one embedding vector for a free-text query.
///
/// Failures never propagate: any provider error (auth, model loading,
/// network, malformed or wrong-dimension response) yields `None`, which the
/// reranking pipeline consumes as its fallback signal. Successful vectors
/// are cached by a hash of the normalized query text.
pub struct QueryEmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
}

impl QueryEmbeddingService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn CacheStore>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            cache_ttl: Duration::from_secs(config.query_cache_ttl_secs),
        }
    }

    /// Embed a query, or `None` when the provider cannot.
    ///
    /// The original text is sent to the provider unchanged; normalization
    /// applies to the cache key only, so trivially restated queries share
    /// an entry.
    #[instrument(name = "embedding.query", skip(self, text), fields(
        cache_hit = tracing::field::Empty
    ))]
    pub async fn generate_query_embedding(&self, text: &str) -> Option<Vec<f32>> {
        let cache_key = self.query_cache_key(text);

        match self.cache.get(&cache_key).await {
            Ok(Some(raw)) => {
                if let Ok(vector) = serde_json::from_str::<Vec<f32>>(&raw) {
                    if vector.len() == self.provider.dimension() {
                        debug!("query embedding cache hit");
                        tracing::Span::current().record("cache_hit", true);
                        return Some(vector);
                    }
                }
                // Corrupt or stale-dimension entry: refetch
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "query embedding cache read failed"),
        }
        tracing::Span::current().record("cache_hit", false);

        let vector = match self.provider.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "query embedding failed, pipeline will fall back");
                return None;
            }
        };
        if vector.len() != self.provider.dimension() {
            warn!(
                expected = self.provider.dimension(),
                actual = vector.len(),
                "query embedding has wrong dimension, pipeline will fall back"
            );
            return None;
        }

        match serde_json::to_string(&vector) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&cache_key, raw, self.cache_ttl).await {
                    warn!(error = %e, "query embedding cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "query embedding not cacheable"),
        }
        Some(vector)
    }

    /// Deterministic cache key over the normalized query, namespaced by
    /// model so switching backends never serves a stale dimension.
    pub(crate) fn query_cache_key(&self, text: &str) -> String {
        let namespace = format!("{}:query", self.provider.model_name());
        hashed_key(&namespace, &normalize_query(text))
    }
}

/// Lowercase, trim, collapse runs of whitespace. Cache-key purposes only.
fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
