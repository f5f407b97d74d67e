//! Mock embedding provider for testing without network calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::provider::{EmbeddingError, EmbeddingProvider};

/// Mock embedding provider returning a fixed vector or a canned failure.
///
/// Counts calls so tests can assert that caching and fallback branches skip
/// the provider.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    vector: Vec<f32>,
    dimension: usize,
    fail_status: Option<u16>,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    /// Provider that answers every request with `vector`
    pub fn new(vector: Vec<f32>) -> Self {
        let dimension = vector.len();
        Self {
            vector,
            dimension,
            fail_status: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every request with the given HTTP status
    pub fn failing_with(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// Claim a dimension different from the returned vector's length
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Number of `embed` invocations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(EmbeddingError::RequestFailed {
                status,
                message: "mock failure".to_string(),
            });
        }
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}
