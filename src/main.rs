use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use folio::config::FolioConfig;
use folio::db;
use folio::db::store;
use folio::payload::HandoffPayload;
use folio::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "folio", version, about = "Autonomous literature-research pipeline")]
struct Cli {
    /// Path to a config file (defaults to ~/.folio/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full research pipeline for a topic
    Run {
        /// Research topic or question
        topic: String,
        /// Additional search queries (defaults to the topic itself)
        #[arg(long = "query")]
        queries: Vec<String>,
    },
    /// Verify the integrity of a hand-off payload file
    Verify {
        /// Path to a handoff_payload.json
        payload: PathBuf,
    },
    /// Export a session's debug view as markdown
    Export {
        /// Session id
        session: String,
    },
    /// List research sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FolioConfig::load_from(path)?,
        None => FolioConfig::load()?,
    };

    // Log to stderr so stdout stays clean for exported artifacts.
    let filter = EnvFilter::try_new(&config.pipeline.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run { topic, queries } => {
            let conn = db::open_database(config.resolved_db_path())?;
            let mut pipeline = Pipeline::new(config, conn);
            let outcome = pipeline.run(&topic, &queries).await?;

            println!("Session: {}", outcome.session_id);
            println!(
                "Papers in manifest: {}",
                outcome.payload.paper_manifest.total_papers
            );
            println!(
                "Gaps identified: {}",
                outcome.payload.gap_analysis.identified_gaps.len()
            );
            println!(
                "Checksum: {}",
                outcome
                    .payload
                    .metadata
                    .validation_checksum
                    .as_deref()
                    .unwrap_or("unsigned")
            );
            println!("Outputs: {}", outcome.output_dir.display());
        }
        Command::Verify { payload } => {
            let contents = std::fs::read_to_string(&payload)
                .with_context(|| format!("failed to read {}", payload.display()))?;
            let payload: HandoffPayload =
                serde_json::from_str(&contents).context("payload is not valid JSON")?;

            let checksum_ok = payload.verify();
            let reference_errors = payload.validate_references();

            println!(
                "Checksum: {}",
                if checksum_ok { "valid" } else { "INVALID" }
            );
            if reference_errors.is_empty() {
                println!("References: valid");
            } else {
                println!("References: {} dangling", reference_errors.len());
                for err in &reference_errors {
                    println!("  - {err}");
                }
            }

            if !checksum_ok || !reference_errors.is_empty() {
                anyhow::bail!("payload failed integrity checks");
            }
        }
        Command::Export { session } => {
            let conn = db::open_database(config.resolved_db_path())?;
            let markdown = store::export_debug_markdown(&conn, &session)?;
            println!("{markdown}");
        }
        Command::Sessions => {
            let conn = db::open_database(config.resolved_db_path())?;
            let sessions = store::list_sessions(&conn)?;
            if sessions.is_empty() {
                println!("No sessions yet.");
            }
            for (id, topic, status, created_at) in sessions {
                println!("{id}  [{status}]  {created_at}  {topic}");
            }
        }
    }

    Ok(())
}
