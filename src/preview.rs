//! Preview/Stats Projection
//!
//! Pure mapping from a ranked result to the UI-shaped summary consumed by
//! the collection-creation and collection-expansion handlers. Counting and
//! shaping only; no business logic.

use serde::{Deserialize, Serialize};

use crate::pipeline::{RankedPaper, RerankedSearch, RerankingStats};

/// UI-consumable summary of a ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPreview {
    pub total_papers: usize,
    pub open_access_count: usize,
    pub paywalled_count: usize,
    /// Papers that carry a similarity score, i.e. embedding coverage of the
    /// returned page
    pub with_embedding_count: usize,
    pub reranking_applied: bool,
    pub papers: Vec<PaperPreview>,
}

/// One paper row in the preview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperPreview {
    pub paper_id: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub citation_count: Option<i32>,
    pub venue: Option<String>,
    pub authors: String,
    pub is_open_access: bool,
    /// Derived from similarity presence, not from raw vectors
    pub has_embedding: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Project a ranked result into its preview. Tolerates empty input: zero
/// papers yields all-zero counts.
pub fn build_preview(papers: &[RankedPaper], stats: &RerankingStats) -> SearchPreview {
    let rows: Vec<PaperPreview> = papers.iter().map(paper_row).collect();
    let open_access_count = rows.iter().filter(|row| row.is_open_access).count();
    let with_embedding_count = rows.iter().filter(|row| row.has_embedding).count();

    SearchPreview {
        total_papers: rows.len(),
        open_access_count,
        paywalled_count: rows.len() - open_access_count,
        with_embedding_count,
        reranking_applied: stats.reranking_applied,
        papers: rows,
    }
}

impl From<&RerankedSearch> for SearchPreview {
    fn from(result: &RerankedSearch) -> Self {
        build_preview(&result.papers, &result.stats)
    }
}

fn paper_row(ranked: &RankedPaper) -> PaperPreview {
    PaperPreview {
        paper_id: ranked.paper.paper_id.clone(),
        title: ranked.paper.title.clone(),
        year: ranked.paper.year,
        citation_count: ranked.paper.citation_count,
        venue: ranked.paper.venue.clone(),
        authors: ranked.paper.author_names(),
        is_open_access: ranked.paper.is_open_access(),
        has_embedding: ranked.similarity.is_some(),
        similarity: ranked.similarity,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FallbackReason;
    use crate::scholar::Paper;

    fn stats(reranking_applied: bool) -> RerankingStats {
        RerankingStats {
            total_searched: 0,
            total_available: None,
            papers_with_embeddings: 0,
            reranking_applied,
            fallback_reason: if reranking_applied {
                None
            } else {
                Some(FallbackReason::QueryEmbeddingFailed)
            },
        }
    }

    fn ranked(paper: Paper, similarity: Option<f32>) -> RankedPaper {
        RankedPaper { paper, similarity }
    }

    #[test]
    fn test_empty_input_all_counts_zero() {
        let preview = build_preview(&[], &stats(true));
        assert_eq!(preview.total_papers, 0);
        assert_eq!(preview.open_access_count, 0);
        assert_eq!(preview.paywalled_count, 0);
        assert_eq!(preview.with_embedding_count, 0);
        assert!(preview.papers.is_empty());
    }

    #[test]
    fn test_open_access_partition() {
        let papers = vec![
            ranked(
                Paper::new("oa").with_open_access_pdf("https://example.org/a.pdf"),
                Some(0.9),
            ),
            ranked(Paper::new("closed"), Some(0.8)),
            ranked(Paper::new("closed2"), Some(0.7)),
        ];

        let preview = build_preview(&papers, &stats(true));
        assert_eq!(preview.total_papers, 3);
        assert_eq!(preview.open_access_count, 1);
        assert_eq!(preview.paywalled_count, 2);
    }

    #[test]
    fn test_has_embedding_from_similarity_presence() {
        // The paper carries a raw vector but no similarity: the preview
        // must report what the ranking used, not the raw field
        let papers = vec![
            ranked(Paper::new("scored").with_embedding(vec![1.0]), Some(0.5)),
            ranked(Paper::new("unscored").with_embedding(vec![1.0]), None),
        ];

        let preview = build_preview(&papers, &stats(false));
        assert_eq!(preview.with_embedding_count, 1);
        assert!(preview.papers[0].has_embedding);
        assert!(!preview.papers[1].has_embedding);
    }

    #[test]
    fn test_reranking_applied_passes_through() {
        assert!(build_preview(&[], &stats(true)).reranking_applied);
        assert!(!build_preview(&[], &stats(false)).reranking_applied);
    }

    #[test]
    fn test_paper_row_shape() {
        let paper = Paper::new("p1")
            .with_title("Attention Is All You Need")
            .with_year(2017)
            .with_citation_count(100_000)
            .with_venue("NeurIPS")
            .with_author("Ashish Vaswani")
            .with_author("Noam Shazeer");
        let preview = build_preview(&[ranked(paper, Some(0.97))], &stats(true));

        let row = &preview.papers[0];
        assert_eq!(row.paper_id, "p1");
        assert_eq!(row.authors, "Ashish Vaswani, Noam Shazeer");
        assert_eq!(row.year, Some(2017));
        assert_eq!(row.similarity, Some(0.97));
    }

    #[test]
    fn test_preview_serializes_camel_case() {
        let preview = build_preview(&[], &stats(true));
        let json = serde_json::to_value(&preview).unwrap();
        assert!(json.get("totalPapers").is_some());
        assert!(json.get("openAccessCount").is_some());
        assert!(json.get("rerankingApplied").is_some());
    }
}
