//! Relevance scoring for candidate papers.
//!
//! Each paper gets a single-paper prompt so scores never cross-contaminate.
//! Batch scoring runs sequentially with a pacing delay to respect rate
//! limits; a paper whose scoring call fails stays unscored rather than
//! aborting the batch.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::warn;

use crate::paper::Paper;
use super::client::LlmClient;

/// The model's verdict on one paper.
#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceAssessment {
    pub relevance_score: f64,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub key_contributions: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
}

fn build_prompt(paper: &Paper, research_topic: &str) -> String {
    format!(
        r#"Analyze the relevance of this academic paper to the given research topic.

Research Topic: {research_topic}

Paper Title: {title}

Paper Abstract:
{abstract_text}

Year: {year}
Citations: {citations}

Provide your analysis in the following JSON format:
{{
    "relevance_score": <float 0.0-1.0>,
    "rationale": "<2-3 sentence explanation of relevance>",
    "key_contributions": ["<contribution 1>", "<contribution 2>"],
    "themes": ["<theme 1>", "<theme 2>"]
}}

Be critical but fair. A score of:
- 0.9-1.0: Directly addresses the research topic
- 0.7-0.89: Highly relevant, addresses related aspects
- 0.5-0.69: Moderately relevant, provides useful context
- 0.3-0.49: Tangentially relevant
- 0.0-0.29: Not relevant to this research topic"#,
        title = paper.title,
        abstract_text = paper.abstract_text.as_deref().unwrap_or("No abstract available"),
        year = paper
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "Unknown".into()),
        citations = paper
            .citation_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Unknown".into()),
    )
}

/// Score a single paper against the research topic.
pub async fn score_paper(
    client: &LlmClient,
    paper: &Paper,
    research_topic: &str,
) -> Result<RelevanceAssessment> {
    let prompt = build_prompt(paper, research_topic);
    let mut assessment: RelevanceAssessment = client.complete_json(&prompt, 1000).await?;
    assessment.relevance_score = assessment.relevance_score.clamp(0.0, 1.0);
    Ok(assessment)
}

/// Copy an assessment onto its paper.
pub fn apply_assessment(paper: &mut Paper, assessment: RelevanceAssessment) {
    paper.relevance_score = Some(assessment.relevance_score);
    paper.relevance_rationale = Some(assessment.rationale);
    paper.key_contributions = assessment.key_contributions;
    paper.themes = assessment.themes;
}

/// Score every paper in place, pacing between calls. Returns the number of
/// papers successfully scored. Afterwards the slice is stably sorted by
/// score descending, unscored papers last.
pub async fn score_papers(
    client: &LlmClient,
    papers: &mut [Paper],
    research_topic: &str,
    api_delay_ms: u64,
) -> Result<usize> {
    let bar = ProgressBar::new(papers.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} {bar:40.cyan/blue} {pos}/{len}")
            .expect("valid template")
            .progress_chars("##-"),
    );
    bar.set_message("scoring relevance");

    let mut scored = 0;
    for paper in papers.iter_mut() {
        match score_paper(client, paper, research_topic).await {
            Ok(assessment) => {
                apply_assessment(paper, assessment);
                scored += 1;
            }
            Err(err) => {
                warn!(title = %paper.title, error = %err, "relevance scoring failed, leaving unscored");
            }
        }
        bar.inc(1);
        crate::search::pace(api_delay_ms).await;
    }
    bar.finish_and_clear();

    sort_by_relevance(papers);
    Ok(scored)
}

/// Stable sort by relevance descending. Equal scores and unscored papers
/// keep their relative order.
pub fn sort_by_relevance(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        let a_score = a.relevance_score.unwrap_or(-1.0);
        let b_score = b.relevance_score.unwrap_or(-1.0);
        b_score.partial_cmp(&a_score).unwrap_or(std::cmp::Ordering::Equal)
    });
}
