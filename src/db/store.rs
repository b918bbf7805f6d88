//! Session-scoped persistence for papers and research artifacts.
//!
//! All writes are idempotent upserts keyed by id, so re-running a pipeline
//! stage never duplicates rows. Structured fields (authors, themes, evidence
//! ids) are stored as JSON text columns.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::paper::{Paper, SourceApi};
use crate::payload::{
    Concept, Gap, HandoffPayload, HypothesisSpecification, NoveltyPotential, Severity,
    TargetJournal,
};

/// Create a new research session. Returns its id.
pub fn create_session(conn: &Connection, topic: &str) -> Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO sessions (id, topic, status, created_at) VALUES (?1, ?2, 'active', ?3)",
        params![id, topic, now],
    )?;
    Ok(id)
}

/// Update a session's status ('active', 'completed', or 'failed').
pub fn update_session_status(conn: &Connection, session_id: &str, status: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE sessions SET status = ?1 WHERE id = ?2",
        params![status, session_id],
    )?;
    anyhow::ensure!(rows == 1, "session not found: {session_id}");
    Ok(())
}

/// Fetch a session's topic and status.
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<(String, String)>> {
    conn.query_row(
        "SELECT topic, status FROM sessions WHERE id = ?1",
        params![session_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .context("failed to read session")
}

/// List all sessions, newest first. Returns (id, topic, status, created_at).
pub fn list_sessions(conn: &Connection) -> Result<Vec<(String, String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT id, topic, status, created_at FROM sessions ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Persist the signed hand-off payload on its session row.
pub fn save_payload(conn: &Connection, session_id: &str, payload: &HandoffPayload) -> Result<()> {
    let json = serde_json::to_string(payload)?;
    conn.execute(
        "UPDATE sessions SET handoff_payload = ?1 WHERE id = ?2",
        params![json, session_id],
    )?;
    Ok(())
}

/// Load a previously saved hand-off payload, if the session has one.
pub fn load_payload(conn: &Connection, session_id: &str) -> Result<Option<HandoffPayload>> {
    let json: Option<Option<String>> = conn
        .query_row(
            "SELECT handoff_payload FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;

    match json.flatten() {
        Some(json) => {
            let payload = serde_json::from_str(&json).context("stored payload is not valid JSON")?;
            Ok(Some(payload))
        }
        None => Ok(None),
    }
}

/// Upsert one paper. Idempotent by paper id.
pub fn save_paper(conn: &Connection, session_id: &str, paper: &Paper) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO papers (
            id, session_id, doi, pmid, openalex_id, title, authors, year,
            abstract, journal, source_api, source_url, citation_count,
            is_open_access, relevance_score, relevance_rationale, themes,
            key_contributions, is_selected, selection_reason, retrieved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            paper.id,
            session_id,
            paper.doi,
            paper.pmid,
            paper.openalex_id,
            paper.title,
            serde_json::to_string(&paper.authors)?,
            paper.year,
            paper.abstract_text,
            paper.journal,
            paper.source_api.as_str(),
            paper.source_url,
            paper.citation_count,
            paper.is_open_access,
            paper.relevance_score,
            paper.relevance_rationale,
            serde_json::to_string(&paper.themes)?,
            serde_json::to_string(&paper.key_contributions)?,
            paper.is_selected,
            paper.selection_reason,
            paper.retrieved_at,
        ],
    )?;
    Ok(())
}

/// Upsert a batch of papers inside one transaction.
pub fn save_papers(conn: &mut Connection, session_id: &str, papers: &[Paper]) -> Result<()> {
    let tx = conn.transaction()?;
    for paper in papers {
        save_paper(&tx, session_id, paper)?;
    }
    tx.commit()?;
    Ok(())
}

/// Fetch papers for a session, ordered by relevance score descending
/// (unscored papers last).
pub fn get_papers(
    conn: &Connection,
    session_id: &str,
    selected_only: bool,
    min_relevance: Option<f64>,
) -> Result<Vec<Paper>> {
    let mut sql = String::from("SELECT * FROM papers WHERE session_id = ?1");
    if selected_only {
        sql.push_str(" AND is_selected = 1");
    }
    if min_relevance.is_some() {
        sql.push_str(" AND relevance_score >= ?2");
    }
    sql.push_str(" ORDER BY relevance_score DESC NULLS LAST, retrieved_at ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = match min_relevance {
        Some(min) => stmt.query_map(params![session_id, min], row_to_paper)?,
        None => stmt.query_map(params![session_id], row_to_paper)?,
    };
    let papers = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(papers)
}

fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<Paper> {
    let authors_json: Option<String> = row.get("authors")?;
    let themes_json: Option<String> = row.get("themes")?;
    let contributions_json: Option<String> = row.get("key_contributions")?;
    let source_api: String = row.get("source_api")?;

    Ok(Paper {
        id: row.get("id")?,
        doi: row.get("doi")?,
        pmid: row.get("pmid")?,
        openalex_id: row.get("openalex_id")?,
        title: row.get("title")?,
        authors: parse_json_column(authors_json.as_deref()),
        year: row.get("year")?,
        abstract_text: row.get("abstract")?,
        journal: row.get("journal")?,
        citation_count: row.get("citation_count")?,
        is_open_access: row.get("is_open_access")?,
        source_api: source_api
            .parse::<SourceApi>()
            .unwrap_or(SourceApi::OpenAlex),
        source_url: row.get("source_url")?,
        relevance_score: row.get("relevance_score")?,
        relevance_rationale: row.get("relevance_rationale")?,
        themes: parse_json_column(themes_json.as_deref()),
        key_contributions: parse_json_column(contributions_json.as_deref()),
        is_selected: row.get("is_selected")?,
        selection_reason: row.get("selection_reason")?,
        retrieved_at: row.get("retrieved_at")?,
    })
}

/// Deserialize a JSON text column, falling back to the default on NULL or
/// malformed content. Legacy rows must never fail a read.
fn parse_json_column<T: serde::de::DeserializeOwned + Default>(json: Option<&str>) -> T {
    json.and_then(|j| serde_json::from_str(j).ok())
        .unwrap_or_default()
}

/// Attach relevance analysis results to a paper row.
pub fn update_paper_analysis(
    conn: &Connection,
    paper_id: &str,
    relevance_score: f64,
    relevance_rationale: &str,
    themes: &[String],
    key_contributions: &[String],
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE papers SET relevance_score = ?1, relevance_rationale = ?2, themes = ?3, key_contributions = ?4 WHERE id = ?5",
        params![
            relevance_score,
            relevance_rationale,
            serde_json::to_string(themes)?,
            serde_json::to_string(key_contributions)?,
            paper_id,
        ],
    )?;
    anyhow::ensure!(rows == 1, "paper not found: {paper_id}");
    Ok(())
}

/// Mark a paper as selected or deselected for the manifest.
pub fn select_paper(
    conn: &Connection,
    paper_id: &str,
    selected: bool,
    reason: Option<&str>,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE papers SET is_selected = ?1, selection_reason = ?2 WHERE id = ?3",
        params![selected, reason, paper_id],
    )?;
    anyhow::ensure!(rows == 1, "paper not found: {paper_id}");
    Ok(())
}

/// Upsert a gap. Idempotent by gap id.
pub fn save_gap(conn: &Connection, session_id: &str, gap: &Gap) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO gaps (id, session_id, title, description, evidence_paper_ids, severity, novelty_potential)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            gap.gap_id,
            session_id,
            gap.title,
            gap.description,
            serde_json::to_string(&gap.evidence_papers)?,
            gap.severity.as_str(),
            gap.novelty_potential.as_str(),
        ],
    )?;
    Ok(())
}

/// Fetch all gaps for a session.
pub fn get_gaps(conn: &Connection, session_id: &str) -> Result<Vec<Gap>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, evidence_paper_ids, severity, novelty_potential
         FROM gaps WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![session_id], |row| {
            let evidence_json: String = row.get(3)?;
            let severity: String = row.get(4)?;
            let novelty: String = row.get(5)?;
            Ok(Gap {
                gap_id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                evidence_papers: serde_json::from_str(&evidence_json).unwrap_or_default(),
                severity: severity.parse::<Severity>().unwrap_or(Severity::Moderate),
                novelty_potential: novelty
                    .parse::<NoveltyPotential>()
                    .unwrap_or(NoveltyPotential::Medium),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Upsert a knowledge-graph concept, keyed by session + term.
pub fn save_concept(conn: &Connection, session_id: &str, concept: &Concept) -> Result<()> {
    let id = format!("{session_id}:{}", concept.term);
    conn.execute(
        "INSERT OR REPLACE INTO concepts (id, session_id, term, definition, relationships)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            session_id,
            concept.term,
            concept.definition,
            serde_json::to_string(&concept.relationships)?,
        ],
    )?;
    Ok(())
}

/// Upsert a hypothesis, keyed by session (one per session).
pub fn save_hypothesis(
    conn: &Connection,
    session_id: &str,
    hypothesis: &HypothesisSpecification,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO hypotheses (id, session_id, problem_statement, research_questions, hypothesis, theoretical_significance, practical_significance, scope_boundaries)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            format!("{session_id}:hypothesis"),
            session_id,
            hypothesis.problem_statement,
            serde_json::to_string(&hypothesis.research_questions)?,
            hypothesis.hypothesis,
            hypothesis.expected_significance.theoretical,
            hypothesis.expected_significance.practical,
            serde_json::to_string(&hypothesis.scope_boundaries)?,
        ],
    )?;
    Ok(())
}

/// Upsert a target journal, keyed by session + name.
pub fn save_journal(conn: &Connection, session_id: &str, journal: &TargetJournal) -> Result<()> {
    let id = format!("{session_id}:{}", journal.name);
    conn.execute(
        "INSERT OR REPLACE INTO target_journals (id, session_id, name, impact_factor, review_cycle_days, fit_rationale, style_guide_url, word_limit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            session_id,
            journal.name,
            journal.impact_factor,
            journal.review_cycle_days,
            journal.fit_rationale,
            journal.style_guide_url,
            journal.word_limit,
        ],
    )?;
    Ok(())
}

/// Write an entry to the pipeline audit log.
pub fn log_action(
    conn: &Connection,
    session_id: &str,
    stage: &str,
    action: &str,
    details: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO pipeline_log (session_id, stage, action, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, stage, action, details, now],
    )?;
    Ok(())
}

/// Render a human-readable markdown view of a session for debugging.
pub fn export_debug_markdown(conn: &Connection, session_id: &str) -> Result<String> {
    let papers = get_papers(conn, session_id, false, None)?;
    let selected: Vec<&Paper> = papers.iter().filter(|p| p.is_selected).collect();
    let gaps = get_gaps(conn, session_id)?;

    let mut lines = vec![
        "# Research Session Debug View".to_string(),
        String::new(),
        format!("**Session ID:** {session_id}"),
        format!("**Total Papers:** {}", papers.len()),
        format!("**Selected Papers:** {}", selected.len()),
        format!("**Gaps Identified:** {}", gaps.len()),
        String::new(),
        "## Selected Papers".to_string(),
        String::new(),
    ];

    for (i, paper) in selected.iter().enumerate() {
        lines.push(format!("### {}. {}", i + 1, paper.title));
        lines.push(format!(
            "- **Year:** {}",
            paper.year.map(|y| y.to_string()).unwrap_or_else(|| "?".into())
        ));
        lines.push(format!("- **DOI:** {}", paper.doi.as_deref().unwrap_or("N/A")));
        lines.push(format!("- **Source:** {}", paper.source_api));
        lines.push(format!(
            "- **Relevance:** {}",
            paper
                .relevance_score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "unscored".into())
        ));
        lines.push(format!("- **Themes:** {}", paper.themes.join(", ")));
        lines.push(String::new());
    }

    lines.push("## Identified Gaps".to_string());
    lines.push(String::new());
    for gap in &gaps {
        lines.push(format!("### {}: {}", gap.gap_id, gap.title));
        lines.push(format!("- **Severity:** {}", gap.severity.as_str()));
        lines.push(format!("- **Description:** {}", gap.description));
        lines.push(format!("- **Evidence Papers:** {}", gap.evidence_papers.join(", ")));
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}
