//! LLM-backed analysis stages.
//!
//! Everything here talks to the model through [`client::LlmClient`] and
//! parses a JSON answer back into typed results. Prompts pin the exact JSON
//! shape they expect; [`client::extract_json`] strips the markdown fences
//! models like to wrap around it.

pub mod client;
pub mod gaps;
pub mod hypothesis;
pub mod journals;
pub mod knowledge;
pub mod relevance;
