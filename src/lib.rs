//! # indagar
//!
//! Research-paper search with semantic reranking.
//!
//! The crate turns a natural-language research interest into a ranked,
//! deduplicated paper list: a bulk-search gateway pulls a large candidate
//! set from the metadata provider while the query is embedded, candidate
//! embeddings are batch-fetched in parallel, and candidates are reordered
//! by cosine similarity to the query. Every stage degrades safely — a
//! missing query embedding or zero candidate embeddings falls back to
//! provider-relevance order with an explicit reason, never an error.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use indagar::cache::InMemoryCache;
//! use indagar::config::RerankConfig;
//! use indagar::pipeline::{RerankPipeline, SearchParams};
//! use indagar::scholar::SearchQuery;
//!
//! # async fn run() -> Result<(), indagar::pipeline::PipelineError> {
//! let pipeline = RerankPipeline::from_config(
//!     RerankConfig::from_env(),
//!     Arc::new(InMemoryCache::new()),
//! );
//!
//! let query = SearchQuery::new("transformer attention").with_year_from(2017);
//! let result = pipeline
//!     .search_with_reranking(&SearchParams::new(query))
//!     .await?;
//!
//! for ranked in &result.papers {
//!     println!("{:?} {:?}", ranked.similarity, ranked.paper.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod candidates;
pub mod config;
pub mod embedding;
pub mod pipeline;
pub mod preview;
pub mod scholar;
pub mod similarity;

pub use cache::{CacheStore, InMemoryCache};
pub use candidates::EmbeddingFetcher;
pub use config::{EmbeddingConfig, PipelineConfig, RerankConfig, ScholarConfig};
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider, QueryEmbeddingService};
pub use pipeline::{
    FallbackReason, PipelineError, RankedPaper, RerankPipeline, RerankedSearch, RerankingStats,
    SearchParams,
};
pub use preview::{build_preview, SearchPreview};
pub use scholar::{Paper, PaperGateway, ScholarClient, SearchQuery, SearchResults};
pub use similarity::{cosine_similarity, rerank_by_similarity, SimilarityError};
