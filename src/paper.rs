//! Core paper type definitions.
//!
//! Defines [`SourceApi`] (the bibliographic catalogs papers arrive from),
//! [`Author`], and [`Paper`] — the canonical record every search client
//! normalizes its results into.

use serde::{Deserialize, Serialize};

/// Bibliographic source catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceApi {
    /// OpenAlex — free open catalog, best DOI and citation coverage.
    OpenAlex,
    /// PubMed/NCBI — biomedical literature, authoritative PMIDs.
    PubMed,
    /// Google Scholar via SerpAPI — broadest coverage, weakest metadata.
    GoogleScholar,
}

impl SourceApi {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAlex => "openalex",
            Self::PubMed => "pubmed",
            Self::GoogleScholar => "google_scholar",
        }
    }
}

impl std::fmt::Display for SourceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized source catalog names.
#[derive(Debug, thiserror::Error)]
#[error("unknown source api: {0}")]
pub struct ParseSourceApiError(String);

impl std::str::FromStr for SourceApi {
    type Err = ParseSourceApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openalex" => Ok(Self::OpenAlex),
            "pubmed" => Ok(Self::PubMed),
            "google_scholar" => Ok(Self::GoogleScholar),
            _ => Err(ParseSourceApiError(s.to_string())),
        }
    }
}

/// Paper author. Insertion order matches the source record's author order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orcid: None,
            affiliation: None,
        }
    }
}

/// One academic work, regardless of which catalog it was observed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// UUID v7 (time-sortable), assigned at ingestion. Never reused.
    pub id: String,
    /// Digital Object Identifier, without the `https://doi.org/` prefix.
    pub doi: Option<String>,
    /// PubMed ID.
    pub pmid: Option<String>,
    /// OpenAlex work ID (full URL form, e.g. `https://openalex.org/W...`).
    pub openalex_id: Option<String>,
    pub title: String,
    pub authors: Vec<Author>,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub journal: Option<String>,
    pub citation_count: Option<u32>,
    pub is_open_access: bool,
    /// Origin catalog. Used only for completeness tie-breaking, never identity.
    pub source_api: SourceApi,
    pub source_url: Option<String>,
    /// Relevance in `[0.0, 1.0]`, absent until scored.
    pub relevance_score: Option<f64>,
    pub relevance_rationale: Option<String>,
    pub themes: Vec<String>,
    pub key_contributions: Vec<String>,
    /// Whether this paper was selected for the final manifest.
    pub is_selected: bool,
    pub selection_reason: Option<String>,
    /// RFC 3339 retrieval timestamp.
    pub retrieved_at: String,
}

impl Paper {
    /// Create a bare record with a fresh UUID v7 id. Everything beyond the
    /// title and source is filled in by the caller.
    pub fn new(title: impl Into<String>, source_api: SourceApi) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            doi: None,
            pmid: None,
            openalex_id: None,
            title: title.into(),
            authors: Vec::new(),
            year: None,
            abstract_text: None,
            journal: None,
            citation_count: None,
            is_open_access: false,
            source_api,
            source_url: None,
            relevance_score: None,
            relevance_rationale: None,
            themes: Vec::new(),
            key_contributions: Vec::new(),
            is_selected: false,
            selection_reason: None,
            retrieved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Render an APA7-style citation string. Other styles fall back to a
    /// plain author-title-year form; full style handling belongs to the
    /// downstream writer.
    pub fn to_citation(&self, style: &str) -> String {
        let mut authors: String = self
            .authors
            .iter()
            .take(3)
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > 3 {
            authors.push_str(" et al.");
        }

        if style == "APA7" {
            let year = match self.year {
                Some(y) => format!("({y})"),
                None => "(n.d.)".to_string(),
            };
            let journal = self
                .journal
                .as_deref()
                .map(|j| format!(" {j}."))
                .unwrap_or_default();
            let doi = self
                .doi
                .as_deref()
                .map(|d| format!(" https://doi.org/{d}"))
                .unwrap_or_default();
            return format!("{authors} {year}. {}.{journal}{doi}", self.title);
        }

        format!(
            "{authors}. {}. {}",
            self.title,
            self.year.map(|y| y.to_string()).unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_api_round_trips_through_str() {
        for api in [SourceApi::OpenAlex, SourceApi::PubMed, SourceApi::GoogleScholar] {
            assert_eq!(api.as_str().parse::<SourceApi>().unwrap(), api);
        }
        assert!("crossref".parse::<SourceApi>().is_err());
    }

    #[test]
    fn apa7_citation_includes_doi_and_year() {
        let mut paper = Paper::new("Attention Is All You Need", SourceApi::OpenAlex);
        paper.authors = vec![Author::new("Vaswani, A."), Author::new("Shazeer, N.")];
        paper.year = Some(2017);
        paper.doi = Some("10.48550/arXiv.1706.03762".into());

        let citation = paper.to_citation("APA7");
        assert!(citation.contains("(2017)"));
        assert!(citation.contains("https://doi.org/10.48550"));
        assert!(citation.starts_with("Vaswani, A., Shazeer, N."));
    }

    #[test]
    fn citation_truncates_long_author_lists() {
        let mut paper = Paper::new("Many Hands", SourceApi::PubMed);
        paper.authors = (0..5).map(|i| Author::new(format!("Author {i}"))).collect();
        assert!(paper.to_citation("APA7").contains("et al."));
    }
}
