//! PubMed/NCBI E-utilities client.
//!
//! Two-step flow: esearch returns PMIDs for a query, efetch returns article
//! XML for those PMIDs. An API key raises NCBI's rate limit from 3 to 10
//! requests per second but is not required.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use tracing::debug;

use crate::paper::{Author, Paper, SourceApi};
use super::{pace, with_retry, SearchFilters};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// esearch retmax cap we apply.
const MAX_RESULTS: usize = 100;

const MAX_AUTHORS: usize = 10;

pub struct PubMedClient {
    client: reqwest::Client,
    api_key: Option<String>,
    email: Option<String>,
    max_retries: u32,
    api_delay_ms: u64,
}

impl PubMedClient {
    pub fn new(
        api_key: Option<String>,
        email: Option<String>,
        max_retries: u32,
        api_delay_ms: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            email,
            max_retries,
            api_delay_ms,
        }
    }

    fn credential_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }
        params
    }

    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Paper>> {
        let pmids = self.esearch(query, filters).await?;
        if pmids.is_empty() {
            debug!(query, "pubmed search matched nothing");
            return Ok(Vec::new());
        }

        pace(self.api_delay_ms).await;
        let papers = self.efetch(&pmids).await?;
        debug!(query, count = papers.len(), "pubmed search complete");
        pace(self.api_delay_ms).await;
        Ok(papers)
    }

    /// Query for PMIDs, relevance-sorted.
    async fn esearch(&self, query: &str, filters: &SearchFilters) -> Result<Vec<String>> {
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("term".to_string(), query.to_string()),
            (
                "retmax".to_string(),
                filters.limit.min(MAX_RESULTS).to_string(),
            ),
            ("retmode".to_string(), "json".to_string()),
            ("sort".to_string(), "relevance".to_string()),
        ];

        if filters.year_from.is_some() || filters.year_to.is_some() {
            let from = filters.year_from.unwrap_or(1800);
            let to = filters.year_to.unwrap_or(3000);
            params.push(("mindate".to_string(), format!("{from}/01/01")));
            params.push(("maxdate".to_string(), format!("{to}/12/31")));
            params.push(("datetype".to_string(), "pdat".to_string()));
        }
        params.extend(self.credential_params());

        let data: Value = with_retry(self.max_retries, "pubmed", || {
            let client = self.client.clone();
            let params = params.clone();
            async move {
                let response = client
                    .get(ESEARCH_URL)
                    .query(&params)
                    .send()
                    .await
                    .context("pubmed esearch request failed")?
                    .error_for_status()
                    .context("pubmed esearch returned an error status")?;
                response.json().await.context("pubmed esearch returned non-JSON")
            }
        })
        .await?;

        let pmids = data["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(pmids)
    }

    /// Fetch article XML for the given PMIDs and parse it.
    async fn efetch(&self, pmids: &[String]) -> Result<Vec<Paper>> {
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("id".to_string(), pmids.join(",")),
            ("retmode".to_string(), "xml".to_string()),
            ("rettype".to_string(), "abstract".to_string()),
        ];
        params.extend(self.credential_params());

        let xml = with_retry(self.max_retries, "pubmed", || {
            let client = self.client.clone();
            let params = params.clone();
            async move {
                let response = client
                    .get(EFETCH_URL)
                    .query(&params)
                    .send()
                    .await
                    .context("pubmed efetch request failed")?
                    .error_for_status()
                    .context("pubmed efetch returned an error status")?;
                response.text().await.context("pubmed efetch read failed")
            }
        })
        .await?;

        parse_pubmed_xml(&xml)
    }
}

/// Parse efetch abstract-mode XML (`<PubmedArticleSet><PubmedArticle>...`).
fn parse_pubmed_xml(xml: &str) -> Result<Vec<Paper>> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Paper> = None;
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut in_author = false;
    let mut in_last_name = false;
    let mut in_fore_name = false;
    let mut in_journal = false;
    let mut in_pub_year = false;
    let mut in_doi = false;
    let mut current_last = String::new();
    let mut current_fore = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(Paper::new("", SourceApi::PubMed));
                }
                b"PMID" if current.as_ref().is_some_and(|p| p.pmid.is_none()) => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Author" => {
                    in_author = true;
                    current_last.clear();
                    current_fore.clear();
                }
                b"LastName" => in_last_name = true,
                b"ForeName" => in_fore_name = true,
                b"Title" => in_journal = true,
                b"Year" => in_pub_year = true,
                b"ArticleId" => {
                    let is_doi = e
                        .try_get_attribute("IdType")
                        .ok()
                        .flatten()
                        .is_some_and(|attr| attr.value.as_ref() == b"doi");
                    if is_doi {
                        in_doi = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut p) = current {
                    if in_pmid {
                        p.pmid = Some(text.clone());
                        p.source_url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{text}/"));
                    }
                    if in_title {
                        p.title = text.clone();
                    }
                    if in_abstract {
                        // Structured abstracts arrive as multiple AbstractText
                        // sections; join them.
                        match &mut p.abstract_text {
                            Some(existing) => {
                                existing.push(' ');
                                existing.push_str(&text);
                            }
                            None => p.abstract_text = Some(text.clone()),
                        }
                    }
                    if in_last_name {
                        current_last = text.clone();
                    }
                    if in_fore_name {
                        current_fore = text.clone();
                    }
                    if in_journal && p.journal.is_none() {
                        p.journal = Some(text.clone());
                    }
                    if in_pub_year && p.year.is_none() {
                        p.year = text.parse().ok();
                    }
                    if in_doi && p.doi.is_none() {
                        p.doi = Some(text.clone());
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"LastName" => in_last_name = false,
                b"ForeName" => in_fore_name = false,
                b"Title" => in_journal = false,
                b"Year" => in_pub_year = false,
                b"ArticleId" => in_doi = false,
                b"Author" => {
                    if in_author {
                        if let Some(ref mut p) = current {
                            if !current_last.is_empty() && p.authors.len() < MAX_AUTHORS {
                                let name = if current_fore.is_empty() {
                                    current_last.clone()
                                } else {
                                    format!("{current_fore} {current_last}")
                                };
                                p.authors.push(Author::new(name));
                            }
                        }
                        in_author = false;
                    }
                }
                b"PubmedArticle" => {
                    if let Some(p) = current.take() {
                        if !p.title.is_empty() {
                            papers.push(p);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("pubmed XML parse error: {e}"),
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>38012345</PMID>
      <Article>
        <Journal>
          <Title>Journal of Vision</Title>
          <JournalIssue><PubDate><Year>2023</Year></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>Microsaccades during fixation tasks</ArticleTitle>
        <Abstract>
          <AbstractText>Background text.</AbstractText>
          <AbstractText>Results text.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Garcia</LastName><ForeName>Maria</ForeName></Author>
          <Author><LastName>Chen</LastName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">38012345</ArticleId>
        <ArticleId IdType="doi">10.1167/jov.23.1.1</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_full_article() {
        let papers = parse_pubmed_xml(SAMPLE_XML).unwrap();
        assert_eq!(papers.len(), 1);

        let p = &papers[0];
        assert_eq!(p.pmid.as_deref(), Some("38012345"));
        assert_eq!(p.title, "Microsaccades during fixation tasks");
        assert_eq!(p.doi.as_deref(), Some("10.1167/jov.23.1.1"));
        assert_eq!(p.year, Some(2023));
        assert_eq!(p.journal.as_deref(), Some("Journal of Vision"));
        assert_eq!(p.abstract_text.as_deref(), Some("Background text. Results text."));
        assert_eq!(p.authors.len(), 2);
        assert_eq!(p.authors[0].name, "Maria Garcia");
        assert_eq!(p.authors[1].name, "Chen");
        assert_eq!(p.source_api, SourceApi::PubMed);
        assert_eq!(
            p.source_url.as_deref(),
            Some("https://pubmed.ncbi.nlm.nih.gov/38012345/")
        );
    }

    #[test]
    fn skips_articles_without_titles() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle><MedlineCitation><PMID>1</PMID></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;
        assert!(parse_pubmed_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn empty_set_parses_to_nothing() {
        assert!(parse_pubmed_xml("<PubmedArticleSet/>").unwrap().is_empty());
    }
}
