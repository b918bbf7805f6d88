//! Research gap detection over the scored corpus.

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

use crate::paper::Paper;
use crate::payload::{Gap, NoveltyPotential, Severity};
use super::client::LlmClient;

/// Papers included in the analysis prompt. More would blow the context
/// budget without improving gap quality.
const MAX_PAPERS_IN_PROMPT: usize = 30;

const MAX_ABSTRACT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct GapAnswer {
    #[serde(default)]
    gaps: Vec<GapRow>,
}

#[derive(Debug, Deserialize)]
struct GapRow {
    gap_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    evidence_papers: Vec<String>,
    severity: Option<String>,
    novelty_potential: Option<String>,
}

fn build_prompt(papers: &[Paper], domain_context: &str, target_gaps: usize) -> String {
    let summaries: Vec<String> = papers
        .iter()
        .take(MAX_PAPERS_IN_PROMPT)
        .enumerate()
        .map(|(i, paper)| {
            let abstract_text = paper.abstract_text.as_deref().unwrap_or("No abstract");
            let truncated: String = abstract_text.chars().take(MAX_ABSTRACT_CHARS).collect();
            format!(
                "Paper {n} (ID: {id}):\nTitle: {title}\nYear: {year}\nThemes: {themes}\nKey Contributions: {contributions}\nAbstract: {truncated}...",
                n = i + 1,
                id = paper.id,
                title = paper.title,
                year = paper
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "Unknown".into()),
                themes = if paper.themes.is_empty() {
                    "Not analyzed".to_string()
                } else {
                    paper.themes.join(", ")
                },
                contributions = if paper.key_contributions.is_empty() {
                    "Not analyzed".to_string()
                } else {
                    paper.key_contributions.join(", ")
                },
            )
        })
        .collect();

    format!(
        r#"You are a research methodology expert analyzing a corpus of academic papers to identify research gaps.

Research Domain: {domain_context}

Number of Papers Analyzed: {count}

Paper Summaries:
{summaries}

Based on this corpus, identify {target_gaps} significant research gaps. A research gap is:
- An unexplored or under-explored area
- A methodological limitation across studies
- A contradiction or inconsistency in findings
- A population or context not adequately studied
- A theoretical framework that needs development

For each gap, provide evidence from the papers (by paper ID).

Return your analysis in this JSON format:
{{
    "gaps": [
        {{
            "gap_id": "GAP_001",
            "title": "<short descriptive title>",
            "description": "<detailed 2-3 sentence description of the gap>",
            "evidence_papers": ["<paper_id_1>", "<paper_id_2>"],
            "severity": "critical|moderate|minor",
            "novelty_potential": "high|medium|low"
        }}
    ]
}}

Be specific and cite evidence from the papers. Gaps should be actionable research opportunities."#,
        count = papers.len(),
        summaries = summaries.join("\n\n"),
    )
}

/// Ask the model for research gaps. Evidence ids the corpus does not contain
/// are dropped here, so downstream reference validation only ever sees ids
/// that entered through the manifest selection rule.
pub async fn detect_gaps(
    client: &LlmClient,
    papers: &[Paper],
    domain_context: &str,
    target_gaps: usize,
) -> Result<Vec<Gap>> {
    anyhow::ensure!(!papers.is_empty(), "no papers provided for gap analysis");

    let prompt = build_prompt(papers, domain_context, target_gaps);
    let answer: GapAnswer = client.complete_json(&prompt, 2000).await?;

    Ok(convert_gaps(answer, papers))
}

fn convert_gaps(answer: GapAnswer, papers: &[Paper]) -> Vec<Gap> {
    let valid_ids: std::collections::HashSet<&str> =
        papers.iter().map(|p| p.id.as_str()).collect();

    let mut gaps = Vec::new();
    for row in answer.gaps {
        let evidence: Vec<String> = row
            .evidence_papers
            .into_iter()
            .filter(|id| {
                let known = valid_ids.contains(id.as_str());
                if !known {
                    warn!(paper_id = %id, "model cited a paper outside the corpus, dropping");
                }
                known
            })
            .collect();

        let fallback_id = format!("GAP_{:03}", gaps.len() + 1);
        gaps.push(Gap {
            gap_id: row.gap_id.unwrap_or(fallback_id),
            title: row.title.unwrap_or_else(|| "Unnamed Gap".into()),
            description: row.description,
            evidence_papers: evidence,
            severity: row
                .severity
                .and_then(|s| s.parse().ok())
                .unwrap_or(Severity::Moderate),
            novelty_potential: row
                .novelty_potential
                .and_then(|s| s.parse().ok())
                .unwrap_or(NoveltyPotential::Medium),
        });
    }
    gaps
}
