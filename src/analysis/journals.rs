//! Target-journal recommendation.

use anyhow::Result;
use serde::Deserialize;

use crate::payload::{HypothesisSpecification, TargetJournal};
use super::client::LlmClient;

#[derive(Debug, Deserialize)]
struct JournalAnswer {
    #[serde(default)]
    journals: Vec<JournalRow>,
}

#[derive(Debug, Deserialize)]
struct JournalRow {
    name: String,
    impact_factor: Option<f64>,
    review_cycle_days: Option<u32>,
    #[serde(default)]
    fit_rationale: String,
    style_guide_url: Option<String>,
    word_limit: Option<u32>,
}

fn build_prompt(
    research_topic: &str,
    hypothesis: Option<&HypothesisSpecification>,
    target_count: usize,
) -> String {
    let hypothesis_text = hypothesis
        .map(|h| {
            format!(
                "\nResearch Problem: {}\nHypothesis: {}\nTheoretical Significance: {}\nPractical Significance: {}",
                h.problem_statement,
                h.hypothesis,
                h.expected_significance.theoretical,
                h.expected_significance.practical,
            )
        })
        .unwrap_or_default();

    format!(
        r#"You are an academic publishing expert helping researchers identify appropriate target journals.

Research Topic: {research_topic}
{hypothesis_text}

Recommend {target_count} academic journals that would be appropriate for this research.

Consider:
1. Scope and aims alignment
2. Impact factor and prestige
3. Review turnaround time
4. Open access options

Return your recommendations in this JSON format:
{{
    "journals": [
        {{
            "name": "<Full journal name>",
            "impact_factor": <float or null>,
            "review_cycle_days": <integer estimate>,
            "fit_rationale": "<Why this journal fits (2-3 sentences)>",
            "style_guide_url": "<URL if known, or null>",
            "word_limit": <integer if known, or null>
        }}
    ]
}}

Provide real, reputable journals. Order by fit quality (best first).
If you don't know exact values (IF, review time), provide reasonable estimates based on journal tier."#
    )
}

pub async fn match_journals(
    client: &LlmClient,
    research_topic: &str,
    hypothesis: Option<&HypothesisSpecification>,
    target_count: usize,
) -> Result<Vec<TargetJournal>> {
    let prompt = build_prompt(research_topic, hypothesis, target_count);
    let mut answer: JournalAnswer = client.complete_json(&prompt, 2000).await?;
    answer.journals.truncate(target_count);

    Ok(answer
        .journals
        .into_iter()
        .map(|row| TargetJournal {
            name: row.name,
            impact_factor: row.impact_factor,
            review_cycle_days: row.review_cycle_days,
            fit_rationale: row.fit_rationale,
            style_guide_url: row.style_guide_url,
            word_limit: row.word_limit,
        })
        .collect())
}
