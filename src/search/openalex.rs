//! OpenAlex client.
//!
//! OpenAlex is a free open catalog with the best DOI and citation coverage of
//! the sources we query. Abstracts arrive as an inverted index (word →
//! positions) and are reconstructed locally.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::paper::{Author, Paper, SourceApi};
use super::{pace, with_retry, SearchFilters};

const BASE_URL: &str = "https://api.openalex.org";

/// OpenAlex caps per_page at 200.
const MAX_PER_PAGE: usize = 200;

/// How many authors we keep per paper.
const MAX_AUTHORS: usize = 10;

pub struct OpenAlexClient {
    client: reqwest::Client,
    /// Polite-pool email. Optional but strongly recommended by OpenAlex.
    email: Option<String>,
    max_retries: u32,
    api_delay_ms: u64,
}

impl OpenAlexClient {
    pub fn new(email: Option<String>, max_retries: u32, api_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            email,
            max_retries,
            api_delay_ms,
        }
    }

    /// Search the works endpoint. Results come back sorted by OpenAlex's own
    /// relevance score.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Paper>> {
        let mut params: Vec<(String, String)> = vec![
            ("search".into(), query.to_string()),
            (
                "per_page".into(),
                filters.limit.min(MAX_PER_PAGE).to_string(),
            ),
            ("sort".into(), "relevance_score:desc".into()),
        ];

        let filter_str = build_filter_string(filters);
        if !filter_str.is_empty() {
            params.push(("filter".into(), filter_str));
        }
        if let Some(email) = &self.email {
            params.push(("mailto".into(), email.clone()));
        }

        let url = format!("{BASE_URL}/works");
        let data: Value = with_retry(self.max_retries, "openalex", || {
            let client = self.client.clone();
            let url = url.clone();
            let params = params.clone();
            async move {
                let response = client
                    .get(&url)
                    .query(&params)
                    .send()
                    .await
                    .context("openalex request failed")?
                    .error_for_status()
                    .context("openalex returned an error status")?;
                response.json().await.context("openalex returned non-JSON")
            }
        })
        .await?;

        let papers: Vec<Paper> = data["results"]
            .as_array()
            .map(|works| works.iter().filter_map(parse_work).collect())
            .unwrap_or_default();

        debug!(query, count = papers.len(), "openalex search complete");
        pace(self.api_delay_ms).await;
        Ok(papers)
    }
}

/// Translate filters into OpenAlex's comma-joined `filter` parameter.
fn build_filter_string(filters: &SearchFilters) -> String {
    let mut parts = Vec::new();

    match (filters.year_from, filters.year_to) {
        (Some(from), Some(to)) => parts.push(format!("publication_year:{from}-{to}")),
        (Some(from), None) => parts.push(format!("publication_year:>{}", from - 1)),
        (None, Some(to)) => parts.push(format!("publication_year:<{}", to + 1)),
        (None, None) => {}
    }
    if let Some(min) = filters.min_citations {
        parts.push(format!("cited_by_count:>{}", min.saturating_sub(1)));
    }
    if filters.open_access {
        parts.push("is_oa:true".into());
    }

    parts.join(",")
}

/// Parse one OpenAlex work object. Returns None for records missing a title.
fn parse_work(work: &Value) -> Option<Paper> {
    let title = work["title"]
        .as_str()
        .or_else(|| work["display_name"].as_str())?;

    let mut paper = Paper::new(title, SourceApi::OpenAlex);

    paper.doi = work["doi"]
        .as_str()
        .map(|d| d.trim_start_matches("https://doi.org/").to_string());
    paper.openalex_id = work["id"].as_str().map(String::from);
    paper.source_url = work["id"].as_str().map(String::from);
    paper.year = work["publication_year"].as_i64().map(|y| y as i32);
    paper.citation_count = work["cited_by_count"].as_u64().map(|c| c as u32);
    paper.is_open_access = work["open_access"]["is_oa"].as_bool().unwrap_or(false);
    paper.journal = work["primary_location"]["source"]["display_name"]
        .as_str()
        .map(String::from);
    paper.abstract_text = reconstruct_abstract(&work["abstract_inverted_index"]);

    if let Some(authorships) = work["authorships"].as_array() {
        for authorship in authorships.iter().take(MAX_AUTHORS) {
            let Some(name) = authorship["author"]["display_name"].as_str() else {
                continue;
            };
            let mut author = Author::new(name);
            author.orcid = authorship["author"]["orcid"].as_str().map(String::from);
            author.affiliation = authorship["institutions"][0]["display_name"]
                .as_str()
                .map(String::from);
            paper.authors.push(author);
        }
    }

    Some(paper)
}

/// Rebuild an abstract from OpenAlex's inverted-index form
/// (`{word: [positions...]}`).
fn reconstruct_abstract(index: &Value) -> Option<String> {
    let index = index.as_object()?;
    if index.is_empty() {
        return None;
    }

    let max_pos = index
        .values()
        .filter_map(|positions| positions.as_array())
        .flatten()
        .filter_map(|p| p.as_u64())
        .max()? as usize;

    let mut words = vec![""; max_pos + 1];
    for (word, positions) in index {
        let Some(positions) = positions.as_array() else {
            continue;
        };
        for pos in positions.iter().filter_map(|p| p.as_u64()) {
            words[pos as usize] = word;
        }
    }

    Some(words.join(" ").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_string_combines_year_range_and_citations() {
        let filters = SearchFilters {
            year_from: Some(2020),
            year_to: Some(2024),
            min_citations: Some(10),
            open_access: true,
            limit: 50,
        };
        assert_eq!(
            build_filter_string(&filters),
            "publication_year:2020-2024,cited_by_count:>9,is_oa:true"
        );
    }

    #[test]
    fn open_ended_year_filters() {
        let mut filters = SearchFilters::with_limit(50);
        filters.year_from = Some(2021);
        assert_eq!(build_filter_string(&filters), "publication_year:>2020");

        let mut filters = SearchFilters::with_limit(50);
        filters.year_to = Some(2019);
        assert_eq!(build_filter_string(&filters), "publication_year:<2020");
    }

    #[test]
    fn abstract_reconstructs_in_position_order() {
        let index = json!({
            "Deep": [0],
            "learning": [1],
            "for": [2],
            "eye": [3, 5],
            "tracking": [4]
        });
        assert_eq!(
            reconstruct_abstract(&index).unwrap(),
            "Deep learning for eye tracking eye"
        );
    }

    #[test]
    fn empty_inverted_index_yields_no_abstract() {
        assert!(reconstruct_abstract(&json!({})).is_none());
        assert!(reconstruct_abstract(&Value::Null).is_none());
    }

    #[test]
    fn work_parses_with_doi_prefix_stripped() {
        let work = json!({
            "id": "https://openalex.org/W2741809807",
            "doi": "https://doi.org/10.7717/peerj.4375",
            "title": "The state of OA",
            "publication_year": 2018,
            "cited_by_count": 1200,
            "open_access": {"is_oa": true},
            "primary_location": {"source": {"display_name": "PeerJ"}},
            "authorships": [
                {"author": {"display_name": "Heather Piwowar", "orcid": null},
                 "institutions": [{"display_name": "Impactstory"}]}
            ]
        });

        let paper = parse_work(&work).unwrap();
        assert_eq!(paper.doi.as_deref(), Some("10.7717/peerj.4375"));
        assert_eq!(paper.openalex_id.as_deref(), Some("https://openalex.org/W2741809807"));
        assert_eq!(paper.year, Some(2018));
        assert!(paper.is_open_access);
        assert_eq!(paper.authors[0].name, "Heather Piwowar");
        assert_eq!(paper.authors[0].affiliation.as_deref(), Some("Impactstory"));
        assert_eq!(paper.source_api, SourceApi::OpenAlex);
    }

    #[test]
    fn untitled_work_is_skipped() {
        assert!(parse_work(&json!({"id": "https://openalex.org/W1"})).is_none());
    }
}
