//! Knowledge-graph extraction from the selected corpus.

use anyhow::Result;
use serde::Deserialize;

use crate::paper::Paper;
use crate::payload::{Concept, KnowledgeGraph};
use super::client::LlmClient;

const MAX_PAPERS_IN_PROMPT: usize = 25;

const MAX_ABSTRACT_CHARS: usize = 400;

#[derive(Debug, Deserialize)]
struct GraphAnswer {
    #[serde(default)]
    concepts: Vec<Concept>,
    #[serde(default)]
    field_boundaries: Vec<String>,
    #[serde(default)]
    methodological_paradigms: Vec<String>,
}

fn build_prompt(papers: &[Paper], research_topic: &str, max_concepts: usize) -> String {
    let content: Vec<String> = papers
        .iter()
        .take(MAX_PAPERS_IN_PROMPT)
        .enumerate()
        .map(|(i, paper)| {
            let abstract_text = paper.abstract_text.as_deref().unwrap_or("No abstract");
            let truncated: String = abstract_text.chars().take(MAX_ABSTRACT_CHARS).collect();
            format!(
                "Paper {n}:\nTitle: {title}\nAbstract: {truncated}\nThemes: {themes}",
                n = i + 1,
                title = paper.title,
                themes = if paper.themes.is_empty() {
                    "N/A".to_string()
                } else {
                    paper.themes.join(", ")
                },
            )
        })
        .collect();

    format!(
        r#"You are a domain expert building a knowledge graph for academic research.

Research Topic: {research_topic}

Analyze these {count} papers and extract the core concepts, their definitions, and relationships.

Papers:
{content}

Extract up to {max_concepts} key concepts that form the conceptual foundation of this research area.

Return your analysis in this JSON format:
{{
    "concepts": [
        {{
            "term": "<concept name>",
            "definition": "<concise 1-2 sentence definition>",
            "relationships": ["<related term 1>", "<related term 2>"]
        }}
    ],
    "field_boundaries": [
        "<what defines this field/area>",
        "<what's included>",
        "<what's excluded>"
    ],
    "methodological_paradigms": [
        "<common methodology 1>",
        "<common methodology 2>"
    ]
}}

Focus on:
1. Core technical concepts specific to this domain
2. Key methodologies and approaches
3. Important theoretical frameworks
4. Domain-specific terminology

Concepts should be interconnected - show relationships between them."#,
        count = papers.len(),
        content = content.join("\n\n"),
    )
}

pub async fn build_knowledge_graph(
    client: &LlmClient,
    papers: &[Paper],
    research_topic: &str,
    max_concepts: usize,
) -> Result<KnowledgeGraph> {
    anyhow::ensure!(!papers.is_empty(), "no papers provided for knowledge extraction");

    let prompt = build_prompt(papers, research_topic, max_concepts);
    let mut answer: GraphAnswer = client.complete_json(&prompt, 3000).await?;
    answer.concepts.truncate(max_concepts);

    Ok(KnowledgeGraph {
        core_concepts: answer.concepts,
        field_boundaries: answer.field_boundaries,
        methodological_paradigms: answer.methodological_paradigms,
    })
}
