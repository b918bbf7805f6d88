//! SQL DDL for all research tables.
//!
//! Defines the `sessions`, `papers`, `gaps`, `concepts`, `hypotheses`,
//! `target_journals`, `pipeline_log`, and `schema_meta` tables. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the research database.
const SCHEMA_SQL: &str = r#"
-- Research session tracking
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','completed','failed')),
    handoff_payload TEXT,
    created_at TEXT NOT NULL
);

-- Paper storage with full provenance
CREATE TABLE IF NOT EXISTS papers (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    doi TEXT,
    pmid TEXT,
    openalex_id TEXT,
    title TEXT NOT NULL,
    authors TEXT,
    year INTEGER,
    abstract TEXT,
    journal TEXT,
    source_api TEXT NOT NULL CHECK(source_api IN ('openalex','pubmed','google_scholar')),
    source_url TEXT,
    citation_count INTEGER,
    is_open_access INTEGER NOT NULL DEFAULT 0,
    relevance_score REAL CHECK(relevance_score IS NULL OR (relevance_score >= 0.0 AND relevance_score <= 1.0)),
    relevance_rationale TEXT,
    themes TEXT,
    key_contributions TEXT,
    is_selected INTEGER NOT NULL DEFAULT 0,
    selection_reason TEXT,
    retrieved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_papers_session ON papers(session_id);
CREATE INDEX IF NOT EXISTS idx_papers_doi ON papers(doi);
CREATE INDEX IF NOT EXISTS idx_papers_selected ON papers(session_id, is_selected);

-- Identified research gaps
CREATE TABLE IF NOT EXISTS gaps (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    evidence_paper_ids TEXT NOT NULL,
    severity TEXT NOT NULL CHECK(severity IN ('critical','moderate','minor')),
    novelty_potential TEXT NOT NULL CHECK(novelty_potential IN ('high','medium','low'))
);

CREATE INDEX IF NOT EXISTS idx_gaps_session ON gaps(session_id);

-- Knowledge graph nodes
CREATE TABLE IF NOT EXISTS concepts (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    term TEXT NOT NULL,
    definition TEXT,
    relationships TEXT
);

CREATE INDEX IF NOT EXISTS idx_concepts_session ON concepts(session_id);

-- Hypotheses
CREATE TABLE IF NOT EXISTS hypotheses (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    problem_statement TEXT,
    research_questions TEXT,
    hypothesis TEXT,
    theoretical_significance TEXT,
    practical_significance TEXT,
    scope_boundaries TEXT
);

-- Target journals
CREATE TABLE IF NOT EXISTS target_journals (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    impact_factor REAL,
    review_cycle_days INTEGER,
    fit_rationale TEXT,
    style_guide_url TEXT,
    word_limit INTEGER
);

-- Audit log
CREATE TABLE IF NOT EXISTS pipeline_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    stage TEXT NOT NULL,
    action TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
