//! Query Embedding Service
//!
//! Turns free-text queries into fixed-dimension vectors via a pluggable
//! [`EmbeddingProvider`] backend, with a 7-day query cache and a
//! fallback-to-`None` policy: the reranking pipeline treats a missing query
//! embedding as a degraded-but-recovered condition, never an error.

mod mock;
mod provider;
mod service;

pub use mock::MockEmbeddingProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, HttpEmbeddingProvider};
pub use service::QueryEmbeddingService;
