#![allow(dead_code)]

use folio::db;
use folio::paper::{Author, Paper, SourceApi};
use rusqlite::Connection;

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// A minimally-populated paper from the given source.
pub fn paper(title: &str, source: SourceApi) -> Paper {
    Paper::new(title, source)
}

/// A fully-populated OpenAlex paper, the "rich" end of the completeness
/// spectrum.
pub fn rich_paper(title: &str, doi: &str) -> Paper {
    let mut p = Paper::new(title, SourceApi::OpenAlex);
    p.doi = Some(doi.to_string());
    p.openalex_id = Some(format!("https://openalex.org/W{}", doi.replace(['.', '/'], "")));
    p.abstract_text = Some("A detailed abstract describing the study.".into());
    p.authors = vec![Author::new("First Author"), Author::new("Second Author")];
    p.year = Some(2023);
    p.citation_count = Some(42);
    p.journal = Some("Journal of Vision".into());
    p
}

/// A sparse Google Scholar record for the same work, the "poor" end.
pub fn sparse_paper(title: &str, doi: &str) -> Paper {
    let mut p = Paper::new(title, SourceApi::GoogleScholar);
    p.doi = Some(doi.to_string());
    p
}

/// A scored paper ready for selection and manifest assembly.
pub fn scored_paper(title: &str, score: f64, selected: bool) -> Paper {
    let mut p = Paper::new(title, SourceApi::OpenAlex);
    p.relevance_score = Some(score);
    p.relevance_rationale = Some("relevant to the topic".into());
    p.is_selected = selected;
    p
}
