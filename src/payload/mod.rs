//! The hand-off payload — the contract between this pipeline and the
//! downstream writing agent.
//!
//! A [`HandoffPayload`] carries the approved paper manifest, gap analysis,
//! knowledge graph, and writing instructions. It is signed with a SHA-256
//! checksum over its canonical serialization so the consumer can detect any
//! drift between signing and use, and its gap evidence is validated against
//! the manifest so the writer can never be handed a citation outside the
//! approved set.

pub mod assemble;
pub mod canonical;

use serde::{Deserialize, Serialize};

use crate::paper::Paper;

pub use assemble::{assemble_payload, AssembleRequest, AssembledPayload};

/// Gap severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Moderate,
    Minor,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Moderate => "moderate",
            Self::Minor => "minor",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "moderate" => Ok(Self::Moderate),
            "minor" => Ok(Self::Minor),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Novelty potential assessment for a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoveltyPotential {
    High,
    Medium,
    Low,
}

impl NoveltyPotential {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for NoveltyPotential {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("unknown novelty potential: {s}")),
        }
    }
}

/// Task assigned to the downstream writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    LiteratureReview,
    SystematicReview,
    IntroductionWriting,
}

/// Citation style options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationStyle {
    #[serde(rename = "APA7")]
    Apa7,
    #[serde(rename = "MLA9")]
    Mla9,
    Chicago,
    #[serde(rename = "IEEE")]
    Ieee,
}

impl CitationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apa7 => "APA7",
            Self::Mla9 => "MLA9",
            Self::Chicago => "Chicago",
            Self::Ieee => "IEEE",
        }
    }
}

/// A concept node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub relationships: Vec<String>,
}

/// Domain knowledge graph extracted from the literature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub core_concepts: Vec<Concept>,
    #[serde(default)]
    pub field_boundaries: Vec<String>,
    #[serde(default)]
    pub methodological_paradigms: Vec<String>,
}

/// Paper entry in the manifest — the hand-off subset of a full [`Paper`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPaper {
    pub id: String,
    pub doi: Option<String>,
    pub title: String,
    /// Author names only; affiliations stay in the full record.
    pub authors: Vec<String>,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub source_api: String,
    pub relevance_score: f64,
    pub relevance_rationale: String,
    #[serde(default)]
    pub themes: Vec<String>,
    pub citation_count: Option<u32>,
    pub retrieval_timestamp: String,
}

impl ManifestPaper {
    pub fn from_paper(paper: &Paper) -> Self {
        Self {
            id: paper.id.clone(),
            doi: paper.doi.clone(),
            title: paper.title.clone(),
            authors: paper.authors.iter().map(|a| a.name.clone()).collect(),
            year: paper.year,
            abstract_text: paper.abstract_text.clone(),
            source_api: paper.source_api.as_str().to_string(),
            relevance_score: paper.relevance_score.unwrap_or(0.0),
            relevance_rationale: paper.relevance_rationale.clone().unwrap_or_default(),
            themes: paper.themes.clone(),
            citation_count: paper.citation_count,
            retrieval_timestamp: paper.retrieved_at.clone(),
        }
    }
}

/// The finalized set of papers the downstream writer may cite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperManifest {
    pub total_papers: usize,
    #[serde(default)]
    pub papers: Vec<ManifestPaper>,
}

impl PaperManifest {
    pub fn add_paper(&mut self, paper: &Paper) {
        self.papers.push(ManifestPaper::from_paper(paper));
        self.total_papers = self.papers.len();
    }

    /// All paper IDs in the manifest.
    pub fn paper_ids(&self) -> std::collections::HashSet<&str> {
        self.papers.iter().map(|p| p.id.as_str()).collect()
    }
}

/// An identified research gap. Immutable once stored; referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    /// Unique gap identifier (e.g. `GAP_001`).
    pub gap_id: String,
    pub title: String,
    pub description: String,
    /// Paper IDs that evidence this gap.
    #[serde(default)]
    pub evidence_papers: Vec<String>,
    pub severity: Severity,
    pub novelty_potential: NoveltyPotential,
}

/// Collection of identified research gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapAnalysis {
    #[serde(default)]
    pub identified_gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSignificance {
    pub theoretical: String,
    pub practical: String,
}

/// Research hypothesis and problem definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisSpecification {
    pub problem_statement: String,
    #[serde(default)]
    pub research_questions: Vec<String>,
    pub hypothesis: String,
    pub expected_significance: ExpectedSignificance,
    #[serde(default)]
    pub scope_boundaries: Vec<String>,
}

/// A candidate journal for the eventual submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetJournal {
    pub name: String,
    pub impact_factor: Option<f64>,
    pub review_cycle_days: Option<u32>,
    pub fit_rationale: String,
    pub style_guide_url: Option<String>,
    pub word_limit: Option<u32>,
}

/// Execution instructions for the downstream writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterInstructions {
    pub task: TaskType,
    pub output_format: String,
    pub citation_style: CitationStyle,
    pub max_tokens: u32,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Default for WriterInstructions {
    fn default() -> Self {
        Self {
            task: TaskType::IntroductionWriting,
            output_format: "markdown".into(),
            citation_style: CitationStyle::Apa7,
            max_tokens: 15_000,
            constraints: vec![
                "Only cite papers from paper_manifest".into(),
                "Address all identified gaps".into(),
                "Follow hypothesis_specification scope".into(),
            ],
        }
    }
}

/// Payload metadata for tracking and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub research_topic: String,
    /// RFC 3339 generation timestamp.
    pub generated_at: String,
    pub pipeline_agent_id: String,
    /// 64-char lowercase hex SHA-256 digest, set by [`HandoffPayload::sign`].
    pub validation_checksum: Option<String>,
}

/// A dangling gap reference found by [`HandoffPayload::validate_references`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceError {
    pub gap_id: String,
    pub paper_id: String,
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gap '{}' references unknown paper: {}",
            self.gap_id, self.paper_id
        )
    }
}

/// The complete hand-off payload.
///
/// Immutable after [`sign`](Self::sign) except for re-signing. The checksum
/// field is excluded from its own computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub metadata: Metadata,
    #[serde(default)]
    pub knowledge_graph: KnowledgeGraph,
    #[serde(default)]
    pub paper_manifest: PaperManifest,
    #[serde(default)]
    pub gap_analysis: GapAnalysis,
    pub hypothesis_specification: Option<HypothesisSpecification>,
    #[serde(default)]
    pub target_journals: Vec<TargetJournal>,
    pub instructions: WriterInstructions,
}

impl HandoffPayload {
    /// SHA-256 hex digest over the canonical serialization, with the
    /// checksum field forced to null first to avoid circularity.
    pub fn compute_checksum(&self) -> String {
        canonical::checksum(self)
    }

    /// Compute and store the checksum. Returns it for convenience.
    pub fn sign(&mut self) -> String {
        let digest = self.compute_checksum();
        self.metadata.validation_checksum = Some(digest.clone());
        digest
    }

    /// Recompute the checksum and compare bit-for-bit with the stored value.
    /// An unsigned payload never verifies.
    pub fn verify(&self) -> bool {
        match &self.metadata.validation_checksum {
            Some(stored) => *stored == self.compute_checksum(),
            None => false,
        }
    }

    /// Check every gap's evidence ids against the manifest id set. Returns
    /// one error per dangling `(gap, paper)` pair; empty means valid.
    pub fn validate_references(&self) -> Vec<ReferenceError> {
        let valid_ids = self.paper_manifest.paper_ids();
        let mut errors = Vec::new();

        for gap in &self.gap_analysis.identified_gaps {
            for paper_id in &gap.evidence_papers {
                if !valid_ids.contains(paper_id.as_str()) {
                    errors.push(ReferenceError {
                        gap_id: gap.gap_id.clone(),
                        paper_id: paper_id.clone(),
                    });
                }
            }
        }

        errors
    }

    /// Human-readable markdown summary for debugging.
    pub fn to_debug_markdown(&self) -> String {
        let mut lines = vec![
            "# Research Hand-off Payload".to_string(),
            String::new(),
            format!("**Topic:** {}", self.metadata.research_topic),
            format!("**Generated:** {}", self.metadata.generated_at),
            format!(
                "**Checksum:** `{}`",
                self.metadata.validation_checksum.as_deref().unwrap_or("unsigned")
            ),
            String::new(),
            format!("## Paper Manifest ({} papers)", self.paper_manifest.total_papers),
            String::new(),
        ];

        for (i, paper) in self.paper_manifest.papers.iter().enumerate() {
            lines.push(format!(
                "{}. **{}** ({})",
                i + 1,
                paper.title,
                paper.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".into())
            ));
            lines.push(format!("   - Relevance: {:.2}", paper.relevance_score));
            lines.push(format!("   - DOI: {}", paper.doi.as_deref().unwrap_or("N/A")));
            lines.push(String::new());
        }

        lines.push(format!(
            "## Identified Gaps ({})",
            self.gap_analysis.identified_gaps.len()
        ));
        lines.push(String::new());

        for gap in &self.gap_analysis.identified_gaps {
            lines.push(format!("### {}: {}", gap.gap_id, gap.title));
            lines.push(format!("**Severity:** {}", gap.severity.as_str()));
            lines.push(format!("**Description:** {}", gap.description));
            lines.push(format!("**Evidence:** {}", gap.evidence_papers.join(", ")));
            lines.push(String::new());
        }

        if let Some(hypothesis) = &self.hypothesis_specification {
            lines.push("## Hypothesis".to_string());
            lines.push(String::new());
            lines.push(format!("**Problem:** {}", hypothesis.problem_statement));
            lines.push(String::new());
            lines.push(format!("**Hypothesis:** {}", hypothesis.hypothesis));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceApi;

    fn sample_payload() -> HandoffPayload {
        let mut paper = Paper::new("Eye Tracking Meets EEG", SourceApi::OpenAlex);
        paper.relevance_score = Some(0.9);
        paper.relevance_rationale = Some("directly on topic".into());

        let mut manifest = PaperManifest::default();
        manifest.add_paper(&paper);

        HandoffPayload {
            metadata: Metadata {
                research_topic: "multimodal neural recording".into(),
                generated_at: "2026-01-01T00:00:00Z".into(),
                pipeline_agent_id: "folio".into(),
                validation_checksum: None,
            },
            knowledge_graph: KnowledgeGraph::default(),
            paper_manifest: manifest,
            gap_analysis: GapAnalysis::default(),
            hypothesis_specification: None,
            target_journals: Vec::new(),
            instructions: WriterInstructions::default(),
        }
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let mut payload = sample_payload();
        let digest = payload.sign();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(payload.verify());
    }

    #[test]
    fn unsigned_payload_does_not_verify() {
        assert!(!sample_payload().verify());
    }

    #[test]
    fn any_mutation_after_signing_fails_verify() {
        let mut payload = sample_payload();
        payload.sign();
        payload.paper_manifest.papers[0].title.push('x');
        assert!(!payload.verify());
    }

    #[test]
    fn re_signing_after_mutation_verifies_again() {
        let mut payload = sample_payload();
        payload.sign();
        payload.metadata.research_topic.push_str(" (revised)");
        assert!(!payload.verify());
        payload.sign();
        assert!(payload.verify());
    }

    #[test]
    fn dangling_evidence_produces_one_error_per_pair() {
        let mut payload = sample_payload();
        let known = payload.paper_manifest.papers[0].id.clone();
        payload.gap_analysis.identified_gaps.push(Gap {
            gap_id: "GAP_001".into(),
            title: "No longitudinal studies".into(),
            description: "All evidence is cross-sectional.".into(),
            evidence_papers: vec![known.clone(), "paper_ghost".into()],
            severity: Severity::Moderate,
            novelty_potential: NoveltyPotential::High,
        });

        let errors = payload.validate_references();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].gap_id, "GAP_001");
        assert_eq!(errors[0].paper_id, "paper_ghost");

        payload.gap_analysis.identified_gaps[0].evidence_papers = vec![known];
        assert!(payload.validate_references().is_empty());
    }

    #[test]
    fn checksum_excludes_itself() {
        let mut payload = sample_payload();
        let before = payload.compute_checksum();
        payload.sign();
        // Storing the checksum must not change the next computation.
        assert_eq!(payload.compute_checksum(), before);
    }
}
