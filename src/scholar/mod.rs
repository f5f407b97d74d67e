//! External Metadata Gateway
//!
//! Resilient client for the bulk paper-search and batch-metadata provider
//! (Semantic Scholar Graph API).
//!
//! Features:
//! - Bulk search with continuation-token pagination and dedup by paper id
//! - Batch metadata fetch, sequential or with bounded concurrency
//! - Citation graph edges (citations/references) and single-paper lookup
//! - Read-through response caching with TTL via an injected [`CacheStore`]
//! - Retry with exponential backoff for transient failures only
//!
//! [`CacheStore`]: crate::cache::CacheStore

mod client;
mod mock;
mod types;

// Re-export client, gateway seam, and field projections
pub use client::{
    GatewayError, PaperGateway, ScholarClient, DEFAULT_SEARCH_FIELDS, EMBEDDING_BATCH_FIELDS,
};

// Re-export mock client
pub use mock::MockScholarClient;

// Re-export all public types from types module
pub use types::{
    AuthorRef, BulkSearchPage, CitationEdge, CitationsPage, ExternalIds, OpenAccessPdf, Paper,
    PaperEmbedding, SearchQuery, SearchResults,
};
