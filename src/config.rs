use serde::{Deserialize, Serialize};

/// Top-level configuration for the search + reranking services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Metadata provider (bulk search, batch fetch) settings
    pub scholar: ScholarConfig,

    /// Query embedding provider settings
    pub embedding: EmbeddingConfig,

    /// Pipeline defaults
    pub pipeline: PipelineConfig,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            scholar: ScholarConfig::default(),
            embedding: EmbeddingConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl RerankConfig {
    /// Default configuration with API keys taken from the environment
    /// (`SEMANTIC_SCHOLAR_API_KEY`, `EMBEDDING_API_KEY`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.scholar.api_key = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok();
        config.embedding.api_key = std::env::var("EMBEDDING_API_KEY").ok();
        config
    }
}

/// Settings for the paper metadata provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    /// Provider API base URL
    pub base_url: String,

    /// Optional API key (higher rate limits)
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for transient failures (429/503/timeout)
    pub retry_max: u32,

    /// Initial retry delay in milliseconds (doubled per attempt)
    pub retry_initial_delay_ms: u64,

    /// Ids per batch POST
    pub batch_chunk_size: usize,

    /// Concurrent in-flight chunks for the parallel batch path
    pub batch_concurrency: usize,

    /// Delay between chunks on the sequential batch path, in milliseconds
    pub batch_delay_ms: u64,

    /// Results requested per bulk-search page
    pub search_page_size: usize,

    /// TTL for cached search responses, in seconds
    pub search_cache_ttl_secs: u64,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
            retry_max: 3,
            retry_initial_delay_ms: 1000,
            batch_chunk_size: 100,
            batch_concurrency: 4,
            batch_delay_ms: 200,
            search_page_size: 100,
            search_cache_ttl_secs: 24 * 60 * 60, // 24 hours
        }
    }
}

/// Settings for the query embedding provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding inference endpoint
    pub endpoint: String,

    /// Optional API key (sent as bearer token)
    pub api_key: Option<String>,

    /// Model identifier, also used as the cache key namespace
    pub model: String,

    /// Expected vector dimension; vectors of any other length are rejected
    pub dimension: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// TTL for cached query embeddings, in seconds
    pub query_cache_ttl_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/allenai/specter2_base"
                .to_string(),
            api_key: None,
            model: "specter_v2".to_string(),
            dimension: 768,
            timeout_secs: 30,
            query_cache_ttl_secs: 7 * 24 * 60 * 60, // 7 days
        }
    }
}

/// Pipeline-level defaults, overridable per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidate cap for bulk search
    pub max_papers: usize,

    /// Ranked results returned to the caller
    pub final_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_papers: 10_000,
            final_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scholar_config() {
        let config = ScholarConfig::default();
        assert_eq!(config.base_url, "https://api.semanticscholar.org/graph/v1");
        assert_eq!(config.retry_max, 3);
        assert_eq!(config.retry_initial_delay_ms, 1000);
        assert_eq!(config.batch_chunk_size, 100);
        assert_eq!(config.search_cache_ttl_secs, 86_400);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_default_embedding_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.dimension, 768);
        assert_eq!(config.model, "specter_v2");
        assert_eq!(config.query_cache_ttl_secs, 604_800);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_papers, 10_000);
        assert_eq!(config.final_limit, 100);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = RerankConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: RerankConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.scholar.base_url, config.scholar.base_url);
        assert_eq!(restored.embedding.dimension, config.embedding.dimension);
        assert_eq!(restored.pipeline.max_papers, config.pipeline.max_papers);
    }

    #[test]
    fn test_from_env_keeps_defaults() {
        let config = RerankConfig::from_env();
        assert_eq!(config.pipeline.final_limit, 100);
        assert_eq!(config.scholar.timeout_secs, 30);
    }
}
