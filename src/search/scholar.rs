//! Google Scholar client, proxied through SerpAPI.
//!
//! Scholar has no official API, so this client is key-gated and off by
//! default. Metadata quality is the weakest of the three sources: years are
//! scraped from summary strings and DOIs sniffed out of result links.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::paper::{Author, Paper, SourceApi};
use super::{pace, with_retry, SearchFilters};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// SerpAPI returns at most 20 organic results per page.
const MAX_PER_PAGE: usize = 20;

const MAX_AUTHORS: usize = 10;

pub struct ScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
    max_retries: u32,
    api_delay_ms: u64,
}

impl ScholarClient {
    pub fn new(api_key: Option<String>, max_retries: u32, api_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            max_retries,
            api_delay_ms,
        }
    }

    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Paper>> {
        let api_key = self.api_key.as_deref().filter(|k| !k.is_empty()).context(
            "Google Scholar search requires a SerpAPI key; set SERPAPI_KEY or disable the source",
        )?;

        let mut params: Vec<(String, String)> = vec![
            ("engine".into(), "google_scholar".into()),
            ("q".into(), query.to_string()),
            ("api_key".into(), api_key.to_string()),
            ("num".into(), filters.limit.min(MAX_PER_PAGE).to_string()),
        ];
        if let Some(from) = filters.year_from {
            params.push(("as_ylo".into(), from.to_string()));
        }
        if let Some(to) = filters.year_to {
            params.push(("as_yhi".into(), to.to_string()));
        }

        let data: Value = with_retry(self.max_retries, "google_scholar", || {
            let client = self.client.clone();
            let params = params.clone();
            async move {
                let response = client
                    .get(SERPAPI_URL)
                    .query(&params)
                    .send()
                    .await
                    .context("serpapi request failed")?
                    .error_for_status()
                    .context("serpapi returned an error status")?;
                response.json().await.context("serpapi returned non-JSON")
            }
        })
        .await?;

        let papers: Vec<Paper> = data["organic_results"]
            .as_array()
            .map(|results| results.iter().filter_map(parse_result).collect())
            .unwrap_or_default();

        debug!(query, count = papers.len(), "google scholar search complete");
        pace(self.api_delay_ms).await;
        Ok(papers)
    }
}

fn parse_result(result: &Value) -> Option<Paper> {
    let title = result["title"].as_str()?;
    let mut paper = Paper::new(title, SourceApi::GoogleScholar);

    if let Some(authors) = result["publication_info"]["authors"].as_array() {
        for author in authors.iter().take(MAX_AUTHORS) {
            if let Some(name) = author["name"].as_str() {
                paper.authors.push(Author::new(name));
            }
        }
    }

    paper.year = result["publication_info"]["summary"]
        .as_str()
        .and_then(extract_year);
    paper.abstract_text = result["snippet"].as_str().map(String::from);
    paper.source_url = result["link"].as_str().map(String::from);
    paper.doi = result["link"].as_str().and_then(extract_doi);
    paper.citation_count = result["inline_links"]["cited_by"]["total"]
        .as_u64()
        .map(|c| c as u32);

    Some(paper)
}

/// Pull a plausible publication year (19xx/20xx) out of a summary string
/// like "M Garcia, J Chen - Journal of Vision, 2023 - jov.org".
fn extract_year(summary: &str) -> Option<i32> {
    let bytes = summary.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        if !window.iter().all(u8::is_ascii_digit) {
            continue;
        }
        // Must stand alone, not be part of a longer number.
        let before_ok = i == 0 || !bytes[i - 1].is_ascii_digit();
        let after_ok = i + 4 >= bytes.len() || !bytes[i + 4].is_ascii_digit();
        if !before_ok || !after_ok {
            continue;
        }
        if window.starts_with(b"19") || window.starts_with(b"20") {
            return std::str::from_utf8(window).ok()?.parse().ok();
        }
    }
    None
}

/// Sniff a DOI (`10.NNNN/suffix`) out of a result URL.
fn extract_doi(link: &str) -> Option<String> {
    let start = link.find("10.")?;
    let candidate = &link[start..];
    let prefix_len = candidate[3..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if prefix_len < 4 {
        return None;
    }
    let rest = &candidate[3 + prefix_len..];
    if !rest.starts_with('/') || rest.len() < 2 {
        return None;
    }
    let end = candidate
        .find(|c: char| c.is_whitespace() || c == '?' || c == '#')
        .unwrap_or(candidate.len());
    Some(candidate[..end].to_string())
}
