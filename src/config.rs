use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dedup::DedupConfig;
use crate::paper::SourceApi;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FolioConfig {
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub analysis: AnalysisConfig,
    pub dedup: DedupSection,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub anthropic_api_key: String,
    pub model: String,
    pub openalex_email: String,
    pub ncbi_api_key: String,
    pub ncbi_email: String,
    pub serpapi_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub output_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub papers_per_source: usize,
    pub use_google_scholar: bool,
    pub api_delay_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_relevance_score: f64,
    pub target_papers: usize,
    pub target_gaps: usize,
    pub target_journals: usize,
    pub max_concepts: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DedupSection {
    pub title_threshold: f64,
    pub source_preference: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            model: "claude-sonnet-4-20250514".into(),
            openalex_email: String::new(),
            ncbi_api_key: String::new(),
            ncbi_email: String::new(),
            serpapi_key: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_folio_dir()
            .join("research.db")
            .to_string_lossy()
            .into_owned();
        let output_dir = default_folio_dir()
            .join("outputs")
            .to_string_lossy()
            .into_owned();
        Self { db_path, output_dir }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            papers_per_source: 50,
            use_google_scholar: false,
            api_delay_ms: 500,
            max_retries: 3,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.5,
            target_papers: 25,
            target_gaps: 3,
            target_journals: 5,
            max_concepts: 30,
        }
    }
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            title_threshold: 0.85,
            source_preference: vec![
                "openalex".into(),
                "pubmed".into(),
                "google_scholar".into(),
            ],
        }
    }
}

/// Returns `~/.folio/`
pub fn default_folio_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".folio")
}

/// Returns the default config file path: `~/.folio/config.toml`
pub fn default_config_path() -> PathBuf {
    default_folio_dir().join("config.toml")
}

impl FolioConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FolioConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides. API keys always come from the
    /// environment when set, so they never have to live in the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FOLIO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("FOLIO_LOG_LEVEL") {
            self.pipeline.log_level = val;
        }
        if let Ok(val) = std::env::var("ANTHROPIC_API_KEY") {
            self.api.anthropic_api_key = val;
        }
        if let Ok(val) = std::env::var("OPENALEX_EMAIL") {
            self.api.openalex_email = val;
        }
        if let Ok(val) = std::env::var("NCBI_API_KEY") {
            self.api.ncbi_api_key = val;
        }
        if let Ok(val) = std::env::var("NCBI_EMAIL") {
            self.api.ncbi_email = val;
        }
        if let Ok(val) = std::env::var("SERPAPI_KEY") {
            self.api.serpapi_key = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the output directory, expanding `~` if needed.
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.output_dir)
    }

    /// Build the deduplicator config from the `[dedup]` section. Unknown
    /// source names are skipped with a warning rather than failing the run.
    pub fn dedup_config(&self) -> DedupConfig {
        let mut source_preference = Vec::new();
        for name in &self.dedup.source_preference {
            match name.parse::<SourceApi>() {
                Ok(api) => source_preference.push(api),
                Err(_) => warn!(source = %name, "unknown source in dedup preference, skipping"),
            }
        }
        DedupConfig {
            title_threshold: self.dedup.title_threshold,
            source_preference,
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
