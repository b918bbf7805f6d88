//! End-to-end research pipeline.
//!
//! Stages run in a fixed order: search → dedup → relevance scoring →
//! selection → gap detection → knowledge graph → hypothesis → journals →
//! payload assembly. The assembled payload must pass the release gate
//! (checksum verifies, no dangling gap references) before anything is
//! handed off; a payload that fails the gate is never written.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::analysis::client::LlmClient;
use crate::analysis::{gaps, hypothesis, journals, knowledge, relevance};
use crate::config::FolioConfig;
use crate::db::store;
use crate::dedup;
use crate::paper::Paper;
use crate::payload::{
    assemble_payload, AssembleRequest, CitationStyle, HandoffPayload, TaskType,
};
use crate::search::{openalex::OpenAlexClient, pubmed::PubMedClient, scholar::ScholarClient};
use crate::search::SearchFilters;

pub struct Pipeline {
    config: FolioConfig,
    conn: Connection,
}

/// What a completed run hands back to the caller.
pub struct PipelineOutcome {
    pub session_id: String,
    pub payload: HandoffPayload,
    pub output_dir: PathBuf,
}

impl Pipeline {
    pub fn new(config: FolioConfig, conn: Connection) -> Self {
        Self { config, conn }
    }

    /// Run the full pipeline for one research topic. On failure the session
    /// is marked failed and the error propagated.
    pub async fn run(&mut self, topic: &str, queries: &[String]) -> Result<PipelineOutcome> {
        let session_id = store::create_session(&self.conn, topic)?;
        info!(session = %session_id, topic, "research session started");

        match self.run_stages(&session_id, topic, queries).await {
            Ok(outcome) => {
                store::update_session_status(&self.conn, &session_id, "completed")?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(status_err) =
                    store::update_session_status(&self.conn, &session_id, "failed")
                {
                    warn!(error = %status_err, "could not mark session failed");
                }
                Err(err)
            }
        }
    }

    async fn run_stages(
        &mut self,
        session_id: &str,
        topic: &str,
        queries: &[String],
    ) -> Result<PipelineOutcome> {
        let default_queries = vec![topic.to_string()];
        let queries = if queries.is_empty() {
            default_queries.as_slice()
        } else {
            queries
        };

        // Stage 1: discovery across all enabled sources.
        let raw_papers = self.search_all(queries).await?;
        anyhow::ensure!(
            !raw_papers.is_empty(),
            "no papers found; try different search queries"
        );
        store::log_action(
            &self.conn,
            session_id,
            "search",
            "discover",
            Some(&format!("{} raw results", raw_papers.len())),
        )?;

        // Stage 2: dedup, then persist the surviving records.
        let before = raw_papers.len();
        let mut papers = dedup::deduplicate(raw_papers, &self.config.dedup_config());
        info!(before, after = papers.len(), "deduplication complete");
        store::save_papers(&mut self.conn, session_id, &papers)?;
        store::log_action(
            &self.conn,
            session_id,
            "dedup",
            "deduplicate",
            Some(&format!("{} -> {} papers", before, papers.len())),
        )?;

        // Stage 3: relevance scoring.
        let llm = LlmClient::new(
            self.config.api.anthropic_api_key.clone(),
            self.config.api.model.clone(),
        );
        let scored =
            relevance::score_papers(&llm, &mut papers, topic, self.config.search.api_delay_ms)
                .await?;
        info!(scored, total = papers.len(), "relevance scoring complete");
        store::save_papers(&mut self.conn, session_id, &papers)?;
        store::log_action(
            &self.conn,
            session_id,
            "analysis",
            "score_relevance",
            Some(&format!("{scored} of {} scored", papers.len())),
        )?;

        // Stage 4: selection. Papers arrive sorted by score descending.
        let selected_count = select_top_papers(
            &mut papers,
            self.config.analysis.min_relevance_score,
            self.config.analysis.target_papers,
        );
        anyhow::ensure!(
            selected_count > 0,
            "no papers passed the relevance threshold; adjust min_relevance_score"
        );
        store::save_papers(&mut self.conn, session_id, &papers)?;
        let selected: Vec<Paper> = papers.iter().filter(|p| p.is_selected).cloned().collect();
        info!(selected = selected.len(), "paper selection complete");

        // Stage 5: gap detection over the selected corpus.
        let detected_gaps = gaps::detect_gaps(
            &llm,
            &selected,
            topic,
            self.config.analysis.target_gaps,
        )
        .await?;
        for gap in &detected_gaps {
            store::save_gap(&self.conn, session_id, gap)?;
        }
        info!(gaps = detected_gaps.len(), "gap detection complete");

        // Stage 6: knowledge synthesis.
        let graph = knowledge::build_knowledge_graph(
            &llm,
            &selected,
            topic,
            self.config.analysis.max_concepts,
        )
        .await?;
        for concept in &graph.core_concepts {
            store::save_concept(&self.conn, session_id, concept)?;
        }

        let hypothesis_spec = if detected_gaps.is_empty() {
            None
        } else {
            let spec = hypothesis::generate_hypothesis(&llm, &detected_gaps, &graph, topic).await?;
            store::save_hypothesis(&self.conn, session_id, &spec)?;
            Some(spec)
        };

        let target_journals = journals::match_journals(
            &llm,
            topic,
            hypothesis_spec.as_ref(),
            self.config.analysis.target_journals,
        )
        .await?;
        for journal in &target_journals {
            store::save_journal(&self.conn, session_id, journal)?;
        }
        store::log_action(&self.conn, session_id, "synthesis", "complete", None)?;

        // Stage 7: assembly and the release gate.
        let assembled = assemble_payload(AssembleRequest {
            research_topic: topic,
            papers: &selected,
            knowledge_graph: Some(graph),
            gaps: detected_gaps,
            hypothesis: hypothesis_spec,
            journals: target_journals,
            task_type: TaskType::IntroductionWriting,
            citation_style: CitationStyle::Apa7,
        });

        if !assembled.reference_warnings.is_empty() {
            let details: Vec<String> = assembled
                .reference_warnings
                .iter()
                .map(ToString::to_string)
                .collect();
            anyhow::bail!(
                "hand-off blocked: payload references papers outside the manifest:\n{}",
                details.join("\n")
            );
        }
        anyhow::ensure!(
            assembled.payload.verify(),
            "hand-off blocked: payload checksum does not verify"
        );

        let payload = assembled.payload;
        store::save_payload(&self.conn, session_id, &payload)?;
        store::log_action(
            &self.conn,
            session_id,
            "assembly",
            "sign_payload",
            payload.metadata.validation_checksum.as_deref(),
        )?;

        let output_dir = self.write_outputs(session_id, &payload)?;
        info!(session = %session_id, dir = %output_dir.display(), "pipeline complete");

        Ok(PipelineOutcome {
            session_id: session_id.to_string(),
            payload,
            output_dir,
        })
    }

    /// Query every enabled source for every query. A single source failing
    /// is logged and skipped; only a total blank is fatal (handled upstream).
    async fn search_all(&self, queries: &[String]) -> Result<Vec<Paper>> {
        let search_cfg = &self.config.search;
        let filters = SearchFilters::with_limit(search_cfg.papers_per_source);

        let openalex = OpenAlexClient::new(
            non_empty(&self.config.api.openalex_email),
            search_cfg.max_retries,
            search_cfg.api_delay_ms,
        );
        let pubmed = PubMedClient::new(
            non_empty(&self.config.api.ncbi_api_key),
            non_empty(&self.config.api.ncbi_email),
            search_cfg.max_retries,
            search_cfg.api_delay_ms,
        );
        let scholar = ScholarClient::new(
            non_empty(&self.config.api.serpapi_key),
            search_cfg.max_retries,
            search_cfg.api_delay_ms,
        );

        let mut all = Vec::new();
        for query in queries {
            info!(query, "searching sources");

            match openalex.search(query, &filters).await {
                Ok(papers) => all.extend(papers),
                Err(err) => warn!(query, error = %err, "openalex search failed, skipping"),
            }
            match pubmed.search(query, &filters).await {
                Ok(papers) => all.extend(papers),
                Err(err) => warn!(query, error = %err, "pubmed search failed, skipping"),
            }
            if search_cfg.use_google_scholar {
                match scholar.search(query, &filters).await {
                    Ok(papers) => all.extend(papers),
                    Err(err) => warn!(query, error = %err, "google scholar search failed, skipping"),
                }
            }
        }
        Ok(all)
    }

    /// Write the hand-off artifacts under `<output_dir>/<session_id>/`.
    fn write_outputs(&self, session_id: &str, payload: &HandoffPayload) -> Result<PathBuf> {
        let dir = self.config.resolved_output_dir().join(session_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;

        let payload_json = serde_json::to_string_pretty(payload)?;
        std::fs::write(dir.join("handoff_payload.json"), payload_json)
            .context("failed to write handoff_payload.json")?;

        let graph_json = serde_json::to_string_pretty(&payload.knowledge_graph)?;
        std::fs::write(dir.join("knowledge_graph.json"), graph_json)
            .context("failed to write knowledge_graph.json")?;

        let debug_md = store::export_debug_markdown(&self.conn, session_id)?;
        std::fs::write(dir.join("session_debug.md"), debug_md)
            .context("failed to write session_debug.md")?;

        Ok(dir)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Mark the top `target` papers at or above `min_score` as selected.
/// Assumes the slice is already sorted by relevance descending. Returns the
/// number selected.
pub fn select_top_papers(papers: &mut [Paper], min_score: f64, target: usize) -> usize {
    let mut selected = 0;
    for paper in papers.iter_mut() {
        let eligible = paper.relevance_score.is_some_and(|s| s >= min_score);
        if eligible && selected < target {
            paper.is_selected = true;
            paper.selection_reason = Some(format!(
                "Relevance score: {:.2}",
                paper.relevance_score.unwrap_or_default()
            ));
            selected += 1;
        } else {
            paper.is_selected = false;
            paper.selection_reason = None;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceApi;

    fn scored(title: &str, score: Option<f64>) -> Paper {
        let mut p = Paper::new(title, SourceApi::OpenAlex);
        p.relevance_score = score;
        p
    }

    #[test]
    fn selection_respects_threshold_and_target() {
        let mut papers = vec![
            scored("A", Some(0.95)),
            scored("B", Some(0.80)),
            scored("C", Some(0.60)),
            scored("D", Some(0.40)),
            scored("E", None),
        ];

        let count = select_top_papers(&mut papers, 0.5, 2);
        assert_eq!(count, 2);
        assert!(papers[0].is_selected);
        assert!(papers[1].is_selected);
        // C is above threshold but beyond the target count.
        assert!(!papers[2].is_selected);
        assert!(!papers[3].is_selected);
        assert!(!papers[4].is_selected);
        assert_eq!(
            papers[0].selection_reason.as_deref(),
            Some("Relevance score: 0.95")
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut papers = vec![scored("Edge", Some(0.5))];
        assert_eq!(select_top_papers(&mut papers, 0.5, 10), 1);
    }

    #[test]
    fn reselection_clears_previous_flags() {
        let mut papers = vec![scored("A", Some(0.9)), scored("B", Some(0.2))];
        papers[1].is_selected = true;
        papers[1].selection_reason = Some("stale".into());

        select_top_papers(&mut papers, 0.5, 5);
        assert!(papers[0].is_selected);
        assert!(!papers[1].is_selected);
        assert!(papers[1].selection_reason.is_none());
    }

    #[test]
    fn nothing_selected_when_all_below_threshold() {
        let mut papers = vec![scored("A", Some(0.3)), scored("B", None)];
        assert_eq!(select_top_papers(&mut papers, 0.5, 5), 0);
    }
}
