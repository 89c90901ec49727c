//! tablesync CLI - mirror an external table into a hosted collection
//!
//! Backend-only tool: it holds write credentials for the target
//! collection, so run it from a server or scheduler, never from anything
//! user-facing. Recurrence is the scheduler's job; each invocation
//! performs exactly one sync run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tablesync_connector::SyncSettings;
use tablesync_engine::SyncRunner;
use tablesync_rest::{CollectionClient, GridSourceClient};

/// Environment variable overriding the source API key.
const ENV_SOURCE_API_KEY: &str = "TABLESYNC_SOURCE_API_KEY";
/// Environment variable overriding the target API key.
const ENV_TARGET_API_KEY: &str = "TABLESYNC_TARGET_API_KEY";

/// tablesync - one-way table-to-collection synchronization
#[derive(Parser)]
#[command(name = "tablesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync of the configured table into the collection
    Run {
        /// Path to the settings file (JSON)
        #[arg(short, long, default_value = "tablesync.json")]
        config: PathBuf,
    },

    /// Validate the settings file and print it with credentials redacted
    CheckConfig {
        /// Path to the settings file (JSON)
        #[arg(short, long, default_value = "tablesync.json")]
        config: PathBuf,
    },
}

fn load_settings(path: &Path) -> Result<SyncSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let mut settings: SyncSettings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;

    // Keys may come from the environment instead of sitting in the file.
    if let Ok(key) = std::env::var(ENV_SOURCE_API_KEY) {
        settings.source.api_key = key;
    }
    if let Ok(key) = std::env::var(ENV_TARGET_API_KEY) {
        settings.target.api_key = key;
    }

    Ok(settings)
}

async fn run_sync(config: &Path) -> Result<()> {
    tracing::info!(config = %config.display(), "Loading settings");
    let settings = load_settings(config)?;

    let source = Arc::new(GridSourceClient::new(&settings.source)?);
    let target = Arc::new(CollectionClient::new(&settings.target)?);
    let runner = SyncRunner::new(source, target, settings)?;

    let report = runner.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.clean() {
        anyhow::bail!("{} record(s) failed to sync", report.failed);
    }
    Ok(())
}

fn check_config(config: &Path) -> Result<()> {
    let settings = load_settings(config)?;
    settings.validate()?;
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_sync(&config).await,
        Commands::CheckConfig { config } => check_config(&config),
    }
}
