//! Embedding provider seam and HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EmbeddingConfig;

// ============================================================================
// Types
// ============================================================================

/// Embedding provider error
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Provider rejected the request (auth failure, model loading, ...)
    #[error("embedding request failed with HTTP {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response carried no usable vector
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Vector length does not match the configured dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Text-to-vector backend.
///
/// Implementations must return vectors of exactly [`dimension`] length;
/// mixing models of different dimensions silently corrupts similarity
/// ranking, so the length is validated both here and by the callers.
///
/// [`dimension`]: EmbeddingProvider::dimension
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into a fixed-dimension vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Expected vector dimension
    fn dimension(&self) -> usize;

    /// Model identifier, used for cache key namespacing
    fn model_name(&self) -> &str;
}

// ============================================================================
// HTTP provider
// ============================================================================

/// HTTP embedding provider.
///
/// Sends `{"inputs": text}` and accepts the two response shapes embedding
/// backends use: a raw JSON array, or `{"preds": [{"embedding": [...]}]}`.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("indagar/0.1 (https://github.com/paiml/indagar)")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
        }
    }

    /// Override the endpoint (for testing)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: WireEmbedding = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        let vector = body
            .into_vector()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no vector in response".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// The two wire shapes embedding backends respond with
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireEmbedding {
    Raw(Vec<f32>),
    Predictions { preds: Vec<Prediction> },
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embedding: Vec<f32>,
}

impl WireEmbedding {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Raw(vector) => Some(vector),
            Self::Predictions { mut preds } => {
                if preds.is_empty() {
                    None
                } else {
                    Some(preds.remove(0).embedding)
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
