//! Hypothesis formulation from gaps and domain knowledge.

use anyhow::Result;
use serde::Deserialize;

use crate::payload::{ExpectedSignificance, Gap, HypothesisSpecification, KnowledgeGraph};
use super::client::LlmClient;

const MAX_CONCEPTS_IN_PROMPT: usize = 15;

#[derive(Debug, Deserialize)]
struct HypothesisAnswer {
    problem_statement: String,
    #[serde(default)]
    research_questions: Vec<String>,
    hypothesis: String,
    expected_significance: SignificanceAnswer,
    #[serde(default)]
    scope_in: Vec<String>,
    #[serde(default)]
    scope_out: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SignificanceAnswer {
    #[serde(default)]
    theoretical: String,
    #[serde(default)]
    practical: String,
}

fn build_prompt(gaps: &[Gap], graph: &KnowledgeGraph, research_topic: &str) -> String {
    let gaps_text: Vec<String> = gaps
        .iter()
        .map(|gap| {
            format!(
                "- {}: {} (Severity: {}, Novelty: {})\n  {}",
                gap.gap_id,
                gap.title,
                gap.severity.as_str(),
                gap.novelty_potential.as_str(),
                gap.description,
            )
        })
        .collect();

    let concepts_text: Vec<String> = graph
        .core_concepts
        .iter()
        .take(MAX_CONCEPTS_IN_PROMPT)
        .map(|c| format!("- {}: {}", c.term, c.definition))
        .collect();

    format!(
        r#"You are a research methodology expert helping to formulate a strong research hypothesis.

Research Topic: {research_topic}

Identified Research Gaps:
{gaps}

Key Domain Concepts:
{concepts}

Common Methodologies: {methodologies}

Based on the gaps and domain knowledge, formulate a clear, testable research hypothesis.

Return your analysis in this JSON format:
{{
    "problem_statement": "<Clear, specific problem statement (2-3 sentences)>",
    "research_questions": [
        "RQ1: <First research question>",
        "RQ2: <Second research question>"
    ],
    "hypothesis": "<Main hypothesis - clear, falsifiable, specific>",
    "expected_significance": {{
        "theoretical": "<How this contributes to theory (2-3 sentences)>",
        "practical": "<Real-world implications (2-3 sentences)>"
    }},
    "scope_in": [
        "<What is included in this research>"
    ],
    "scope_out": [
        "<What is explicitly excluded>"
    ]
}}

Guidelines for a strong hypothesis:
1. Directly addresses at least one identified gap
2. Is testable/falsifiable
3. Builds on existing knowledge
4. Has clear theoretical and practical significance
5. Is appropriately scoped"#,
        gaps = gaps_text.join("\n"),
        concepts = concepts_text.join("\n"),
        methodologies = graph.methodological_paradigms.join(", "),
    )
}

pub async fn generate_hypothesis(
    client: &LlmClient,
    gaps: &[Gap],
    graph: &KnowledgeGraph,
    research_topic: &str,
) -> Result<HypothesisSpecification> {
    anyhow::ensure!(!gaps.is_empty(), "no gaps provided for hypothesis generation");

    let prompt = build_prompt(gaps, graph, research_topic);
    let answer: HypothesisAnswer = client.complete_json(&prompt, 2000).await?;

    Ok(convert(answer))
}

fn convert(answer: HypothesisAnswer) -> HypothesisSpecification {
    let mut scope_boundaries: Vec<String> = answer
        .scope_in
        .into_iter()
        .map(|s| format!("In scope: {s}"))
        .collect();
    scope_boundaries.extend(
        answer
            .scope_out
            .into_iter()
            .map(|s| format!("Out of scope: {s}")),
    );

    HypothesisSpecification {
        problem_statement: answer.problem_statement,
        research_questions: answer.research_questions,
        hypothesis: answer.hypothesis,
        expected_significance: ExpectedSignificance {
            theoretical: answer.expected_significance.theoretical,
            practical: answer.expected_significance.practical,
        },
        scope_boundaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::client::parse_json_answer;
    use crate::payload::{NoveltyPotential, Severity};

    fn sample_gap() -> Gap {
        Gap {
            gap_id: "GAP_001".into(),
            title: "No cross-modal studies".into(),
            description: "Audio and visual attention are studied separately.".into(),
            evidence_papers: vec![],
            severity: Severity::Critical,
            novelty_potential: NoveltyPotential::High,
        }
    }

    #[test]
    fn prompt_names_gaps_with_severity() {
        let prompt = build_prompt(&[sample_gap()], &KnowledgeGraph::default(), "attention");
        assert!(prompt.contains("GAP_001"));
        assert!(prompt.contains("Severity: critical"));
        assert!(prompt.contains("attention"));
    }

    #[test]
    fn scope_lists_merge_into_labeled_boundaries() {
        let answer: HypothesisAnswer = parse_json_answer(
            r#"{
                "problem_statement": "Problem.",
                "research_questions": ["RQ1: How?"],
                "hypothesis": "H1.",
                "expected_significance": {"theoretical": "T.", "practical": "P."},
                "scope_in": ["adults"],
                "scope_out": ["children"]
            }"#,
        )
        .unwrap();

        let spec = convert(answer);
        assert_eq!(
            spec.scope_boundaries,
            vec!["In scope: adults".to_string(), "Out of scope: children".to_string()]
        );
        assert_eq!(spec.expected_significance.theoretical, "T.");
    }
}
