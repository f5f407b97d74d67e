//! Type definitions for provider API responses and search filters.

use serde::{Deserialize, Serialize};

// ============================================================================
// Paper model
// ============================================================================

/// A research paper as returned by the metadata provider.
///
/// `paper_id` is the sole identity: two papers are the same entity iff their
/// ids are equal. Every other field is optional on the wire — the provider
/// omits anything not covered by the requested field projection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Opaque provider id, primary identity
    #[serde(default)]
    pub paper_id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub citation_count: Option<i32>,

    #[serde(default)]
    pub venue: Option<String>,

    /// Ordered author list
    #[serde(default)]
    pub authors: Vec<AuthorRef>,

    /// Present when the provider knows a freely downloadable PDF
    #[serde(default)]
    pub open_access_pdf: Option<OpenAccessPdf>,

    #[serde(default)]
    pub external_ids: Option<ExternalIds>,

    /// Present only when the embedding field was requested; the vector
    /// itself may still be missing for papers the provider never embedded
    #[serde(default)]
    pub embedding: Option<PaperEmbedding>,
}

impl Paper {
    pub fn new(paper_id: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_citation_count(mut self, count: i32) -> Self {
        self.citation_count = Some(count);
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.authors.push(AuthorRef::new(name));
        self
    }

    pub fn with_open_access_pdf(mut self, url: impl Into<String>) -> Self {
        self.open_access_pdf = Some(OpenAccessPdf {
            url: Some(url.into()),
            status: None,
        });
        self
    }

    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(PaperEmbedding {
            model: None,
            vector: Some(vector),
        });
        self
    }

    /// Whether a freely downloadable PDF is known for this paper
    pub fn is_open_access(&self) -> bool {
        self.open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.as_ref())
            .is_some()
    }

    /// The attached embedding vector, if any
    pub fn embedding_vector(&self) -> Option<&[f32]> {
        self.embedding.as_ref()?.vector.as_deref()
    }

    /// Author names as a comma-separated string
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .filter_map(|a| a.name.as_deref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Author reference attached to a paper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

impl AuthorRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            author_id: None,
            name: Some(name.into()),
        }
    }
}

/// Open access PDF information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccessPdf {
    pub url: Option<String>,
    pub status: Option<String>,
}

/// External identifiers for a paper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, rename = "DOI")]
    pub doi: Option<String>,

    #[serde(default, rename = "ArXiv")]
    pub arxiv: Option<String>,

    #[serde(default, rename = "PubMed")]
    pub pubmed: Option<String>,

    #[serde(default, rename = "DBLP")]
    pub dblp: Option<String>,

    #[serde(default, rename = "CorpusId")]
    pub corpus_id: Option<i64>,
}

/// Provider-attached embedding for a paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperEmbedding {
    pub model: Option<String>,
    pub vector: Option<Vec<f32>>,
}

// ============================================================================
// Search filters
// ============================================================================

/// Filters for bulk paper search
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Keyword / natural-language query text
    pub query: String,
    /// Inclusive lower publication-year bound
    pub year_from: Option<i32>,
    /// Inclusive upper publication-year bound
    pub year_to: Option<i32>,
    /// Minimum citation count
    pub min_citations: Option<u32>,
    /// Restrict to papers with an open-access PDF
    pub open_access_only: bool,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_year_from(mut self, year: i32) -> Self {
        self.year_from = Some(year);
        self
    }

    pub fn with_year_to(mut self, year: i32) -> Self {
        self.year_to = Some(year);
        self
    }

    pub fn with_min_citations(mut self, count: u32) -> Self {
        self.min_citations = Some(count);
        self
    }

    pub fn with_open_access_only(mut self) -> Self {
        self.open_access_only = true;
        self
    }

    /// Build the provider query string: keyword text with `year:` and
    /// `citationCount:` qualifiers appended when present.
    pub fn to_provider_query(&self) -> String {
        let mut q = self.query.trim().to_string();
        match (self.year_from, self.year_to) {
            (Some(from), Some(to)) => q.push_str(&format!(" year:{}-{}", from, to)),
            (Some(from), None) => q.push_str(&format!(" year:{}-", from)),
            (None, Some(to)) => q.push_str(&format!(" year:-{}", to)),
            (None, None) => {}
        }
        if let Some(min) = self.min_citations {
            q.push_str(&format!(" citationCount:>{}", min));
        }
        q
    }

    /// Canonical form used for cache keys
    pub(crate) fn canonical(&self) -> String {
        format!(
            "q={}|yf={:?}|yt={:?}|mc={:?}|oa={}",
            self.query.trim(),
            self.year_from,
            self.year_to,
            self.min_citations,
            self.open_access_only,
        )
    }
}

// ============================================================================
// Response envelopes
// ============================================================================

/// One page of the provider's bulk-search response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkSearchPage {
    /// Total matches the provider reports for the query
    #[serde(default)]
    pub total: u64,

    #[serde(default)]
    pub offset: Option<u64>,

    #[serde(default)]
    pub next: Option<u64>,

    /// Continuation token for the next page, absent on the last page
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub data: Vec<Paper>,
}

impl BulkSearchPage {
    /// Whether another page can be fetched
    pub fn has_more(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Aggregated result of a paged bulk search, deduplicated by paper id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Provider-reported total matches (may exceed `papers.len()`)
    pub total: u64,
    /// Candidate papers in provider-relevance order
    pub papers: Vec<Paper>,
}

/// One page of the citations/references endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationsPage {
    #[serde(default)]
    pub offset: Option<u64>,

    #[serde(default)]
    pub next: Option<u64>,

    #[serde(default)]
    pub data: Vec<CitationEdge>,
}

/// A citation-graph edge; exactly one side is populated depending on
/// whether the citations or references endpoint was called
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationEdge {
    #[serde(default)]
    pub citing_paper: Option<Paper>,

    #[serde(default)]
    pub cited_paper: Option<Paper>,
}
