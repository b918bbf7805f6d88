//! Payload assembly — manifest selection, instruction building, signing.
//!
//! [`assemble_payload`] is the single entry point. It admits papers into the
//! manifest by the selection rule (explicitly selected OR relevance ≥ 0.5),
//! signs the payload, and collects reference-validation warnings without
//! failing; the release gate in the pipeline decides whether warnings are
//! fatal.

use super::{
    CitationStyle, Gap, GapAnalysis, HandoffPayload, HypothesisSpecification, KnowledgeGraph,
    Metadata, PaperManifest, ReferenceError, TargetJournal, TaskType, WriterInstructions,
};
use crate::paper::Paper;

/// Papers with a relevance score at or above this enter the manifest even
/// without an explicit selection flag.
pub const MANIFEST_RELEVANCE_FLOOR: f64 = 0.5;

/// Everything the assembler needs for one research session.
pub struct AssembleRequest<'a> {
    pub research_topic: &'a str,
    pub papers: &'a [Paper],
    pub knowledge_graph: Option<KnowledgeGraph>,
    pub gaps: Vec<Gap>,
    pub hypothesis: Option<HypothesisSpecification>,
    pub journals: Vec<TargetJournal>,
    pub task_type: TaskType,
    pub citation_style: CitationStyle,
}

/// A signed payload plus the validation warnings gathered during assembly.
pub struct AssembledPayload {
    pub payload: HandoffPayload,
    /// Dangling gap references. Assembly succeeds with warnings; consumers
    /// must treat a non-empty list as fatal before hand-off.
    pub reference_warnings: Vec<ReferenceError>,
}

/// Build, sign, and reference-check the hand-off payload.
pub fn assemble_payload(request: AssembleRequest<'_>) -> AssembledPayload {
    let mut manifest = PaperManifest::default();
    for paper in request.papers {
        let above_floor = paper
            .relevance_score
            .is_some_and(|s| s >= MANIFEST_RELEVANCE_FLOOR);
        if paper.is_selected || above_floor {
            manifest.add_paper(paper);
        }
    }

    let instructions = WriterInstructions {
        task: request.task_type,
        output_format: "markdown".into(),
        citation_style: request.citation_style,
        max_tokens: 15_000,
        constraints: vec![
            "Only cite papers from paper_manifest".into(),
            "Address all identified gaps".into(),
            "Follow hypothesis_specification scope".into(),
            "Maintain academic writing standards".into(),
            format!("Use {} citation format", request.citation_style.as_str()),
        ],
    };

    let mut payload = HandoffPayload {
        metadata: Metadata {
            research_topic: request.research_topic.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            pipeline_agent_id: "folio_pipeline".into(),
            validation_checksum: None,
        },
        knowledge_graph: request.knowledge_graph.unwrap_or_default(),
        paper_manifest: manifest,
        gap_analysis: GapAnalysis {
            identified_gaps: request.gaps,
        },
        hypothesis_specification: request.hypothesis,
        target_journals: request.journals,
        instructions,
    };

    payload.sign();

    let reference_warnings = payload.validate_references();
    if !reference_warnings.is_empty() {
        tracing::warn!(
            count = reference_warnings.len(),
            "assembled payload has dangling gap references"
        );
    }

    AssembledPayload {
        payload,
        reference_warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceApi;
    use crate::payload::{NoveltyPotential, Severity};

    fn scored_paper(title: &str, score: f64, selected: bool) -> Paper {
        let mut paper = Paper::new(title, SourceApi::OpenAlex);
        paper.relevance_score = Some(score);
        paper.relevance_rationale = Some("test".into());
        paper.is_selected = selected;
        paper
    }

    fn request(papers: &[Paper]) -> AssembleRequest<'_> {
        AssembleRequest {
            research_topic: "EEG and eye tracking",
            papers,
            knowledge_graph: None,
            gaps: Vec::new(),
            hypothesis: None,
            journals: Vec::new(),
            task_type: TaskType::IntroductionWriting,
            citation_style: CitationStyle::Apa7,
        }
    }

    #[test]
    fn manifest_admits_selected_or_high_relevance_only() {
        // Scenario C: 3 selected, 2 with score 0.3 — manifest holds exactly 3.
        let papers = vec![
            scored_paper("One", 0.9, true),
            scored_paper("Two", 0.8, true),
            scored_paper("Three", 0.7, true),
            scored_paper("Four", 0.3, false),
            scored_paper("Five", 0.3, false),
        ];

        let assembled = assemble_payload(request(&papers));
        assert_eq!(assembled.payload.paper_manifest.total_papers, 3);

        let checksum = assembled.payload.metadata.validation_checksum.as_deref().unwrap();
        assert_eq!(checksum.len(), 64);
        assert!(assembled.payload.verify());
    }

    #[test]
    fn relevance_floor_is_inclusive() {
        let papers = vec![scored_paper("Edge", 0.5, false)];
        let assembled = assemble_payload(request(&papers));
        assert_eq!(assembled.payload.paper_manifest.total_papers, 1);
    }

    #[test]
    fn unscored_unselected_papers_are_excluded() {
        let paper = Paper::new("Never Scored", SourceApi::PubMed);
        let papers = vec![paper];
        let assembled = assemble_payload(request(&papers));
        assert_eq!(assembled.payload.paper_manifest.total_papers, 0);
    }

    #[test]
    fn dangling_gap_references_become_warnings_not_errors() {
        let papers = vec![scored_paper("Real Paper", 0.9, true)];
        let mut req = request(&papers);
        req.gaps = vec![Gap {
            gap_id: "GAP_001".into(),
            title: "Gap".into(),
            description: "desc".into(),
            evidence_papers: vec!["missing_id".into()],
            severity: Severity::Critical,
            novelty_potential: NoveltyPotential::High,
        }];

        let assembled = assemble_payload(req);
        assert_eq!(assembled.reference_warnings.len(), 1);
        assert_eq!(assembled.reference_warnings[0].paper_id, "missing_id");
        // Still signed despite the warning.
        assert!(assembled.payload.verify());
    }

    #[test]
    fn instructions_carry_citation_style_constraint() {
        let papers = vec![scored_paper("P", 0.9, true)];
        let mut req = request(&papers);
        req.citation_style = CitationStyle::Ieee;
        let assembled = assemble_payload(req);
        assert!(assembled
            .payload
            .instructions
            .constraints
            .iter()
            .any(|c| c.contains("IEEE")));
    }
}
