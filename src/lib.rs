//! Autonomous literature-research pipeline.
//!
//! Folio discovers academic papers across multiple bibliographic catalogs,
//! resolves duplicates into a canonical corpus, scores each paper's relevance
//! to a research topic, and synthesizes the results into a signed hand-off
//! payload a downstream writing agent can trust.
//!
//! # Pipeline
//!
//! 1. **Search** — OpenAlex, PubMed, and optionally Google Scholar, all
//!    normalized into one [`paper::Paper`] shape
//! 2. **Dedup** — identity resolution by DOI, PMID, OpenAlex id, and
//!    normalized-title similarity, keeping the most complete record
//! 3. **Analysis** — LLM relevance scoring, gap detection, knowledge-graph
//!    extraction, hypothesis and journal synthesis
//! 4. **Hand-off** — payload assembly with a SHA-256 integrity checksum and
//!    referential validation of gap evidence against the paper manifest
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`paper`] — Canonical paper, author, and source types
//! - [`dedup`] — Cross-source duplicate resolution
//! - [`search`] — Bibliographic API clients
//! - [`analysis`] — LLM-backed scoring and synthesis stages
//! - [`payload`] — Hand-off payload types, canonical checksum, assembly
//! - [`db`] — SQLite session persistence
//! - [`pipeline`] — End-to-end orchestration and the release gate

pub mod analysis;
pub mod config;
pub mod db;
pub mod dedup;
pub mod paper;
pub mod payload;
pub mod pipeline;
pub mod search;
