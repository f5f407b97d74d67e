//! Vector Similarity Engine
//!
//! Pure numeric module: cosine similarity over embedding vectors and top-K
//! reranking of search candidates. No I/O, no state, deterministic for
//! identical inputs.

use std::cmp::Ordering;

use crate::scholar::Paper;

/// Similarity computation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimilarityError {
    /// Vectors of different lengths were compared. A mismatch means
    /// embeddings from different models were mixed, which is a
    /// configuration bug, so it fails loudly instead of saturating to zero.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Cosine similarity between two vectors of equal dimension.
///
/// Saturation policy: zero-length inputs and zero-magnitude vectors yield
/// `0.0` rather than an error (there is no meaningful angle to report, and
/// dividing by a zero norm must never panic the pipeline).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Rerank candidates by cosine similarity to `query`, descending.
///
/// Candidates without a usable embedding vector (absent or empty) are
/// excluded. Ties keep the original candidate order (stable sort). The
/// output is truncated to `top_k`, so its length is
/// `min(top_k, candidates_with_embedding)`.
///
/// A candidate vector of the wrong dimension surfaces
/// [`SimilarityError::DimensionMismatch`]; upstream fetch stages exclude
/// wrong-dimension vectors, so hitting it here means misconfiguration.
pub fn rerank_by_similarity(
    candidates: &[Paper],
    query: &[f32],
    top_k: usize,
) -> Result<Vec<(Paper, f32)>, SimilarityError> {
    let mut scored: Vec<(Paper, f32)> = Vec::new();
    for paper in candidates {
        let Some(vector) = paper.embedding_vector() else {
            continue;
        };
        if vector.is_empty() {
            continue;
        }
        let similarity = cosine_similarity(vector, query)?;
        scored.push((paper.clone(), similarity));
    }

    // Vec::sort_by is stable: equal similarities keep provider order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}

// ============================================================================
// Tests
// ============================================================================
