//! Steward CLI - file-backed multi-agent orchestrator daemon

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use steward_core::{HttpCompletion, Layout, Orchestrator};

#[derive(Parser)]
#[command(name = "steward", version, about = "File-backed multi-agent orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator daemon
    Daemon {
        /// Run one reconciliation pass and exit instead of watching
        #[arg(long)]
        pump: bool,

        /// Workspace root containing templates/, sessions/, tasks/, storage/
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Daemon { pump, root } => match run_daemon(pump, root).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("fatal: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_daemon(pump: bool, root: PathBuf) -> Result<()> {
    // Credentials come from the environment; a missing key is fatal at
    // startup, before any file is touched.
    let api_key = std::env::var("STEWARD_API_KEY")
        .context("STEWARD_API_KEY is not set (completion service credentials)")?;
    let api_base = std::env::var("STEWARD_API_BASE")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let completion = Arc::new(HttpCompletion::new(api_base, api_key));
    let orchestrator = Orchestrator::new(Layout::new(&root), completion)
        .with_context(|| format!("failed to start orchestrator in {}", root.display()))?;

    if pump {
        info!("running one reconciliation pass in {}", root.display());
        orchestrator.pump().await?;
        return Ok(());
    }

    Arc::new(orchestrator).run_watch().await?;
    Ok(())
}
