mod analysis;
mod archive;
mod cli;
mod config;
mod error;
mod events;
mod jsonl;
mod report;
mod server;
mod session;
mod usage;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::commands;
use crate::config::{load_config_from, Config};

#[derive(Parser)]
#[command(name = "cost-tracker")]
#[command(about = "Per-session time and cost accounting for agent tool calls")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "COST_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory (session logs, archives, history)
    #[arg(long, global = true, env = "COST_TRACKER_DIR")]
    data_dir: Option<PathBuf>,

    /// Override the directory searched for session transcripts
    #[arg(long, global = true, env = "COST_TRACKER_PROJECTS_DIR")]
    projects_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a host hook event read from stdin (pre, post, stop, prompt-inject)
    Hook {
        mode: String,
    },

    /// Full report for a session (defaults to the most recent active one)
    Report {
        session_id: Option<String>,
    },

    /// Short summary box for the most recent active session
    Inline,

    /// Cost totals across archived sessions
    History {
        /// Number of days to include
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Recommendations from recent session history
    Suggest,

    /// Serve reports as JSON-RPC tools over stdio
    Serve,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("COST_TRACKER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        config: cli.config,
        data_dir: cli.data_dir,
        projects_dir: cli.projects_dir,
    };

    match cli.command {
        Commands::Hook { mode } => commands::hook::run(&mode, overrides.load_lenient()).await?,
        Commands::Report { session_id } => {
            commands::report::run(overrides.load()?, session_id).await?
        }
        Commands::Inline => commands::report::run_inline(overrides.load()?).await?,
        Commands::History { days } => commands::history::run(overrides.load()?, days).await?,
        Commands::Suggest => commands::suggest::run(overrides.load()?).await?,
        Commands::Serve => commands::serve::run(overrides.load()?).await?,
        Commands::Config => commands::config::run(overrides.load()?).await?,
    }

    Ok(())
}

/// Global flags that shape the loaded configuration
struct Overrides {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    projects_dir: Option<PathBuf>,
}

impl Overrides {
    fn load(&self) -> Result<Config> {
        let config = load_config_from(self.config.as_deref())
            .context("failed to load configuration")?;
        Ok(self.apply(config))
    }

    /// Hooks must always answer, so a broken config falls back to defaults
    fn load_lenient(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {:#}", e);
                self.apply(Config::default())
            }
        }
    }

    fn apply(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.data_dir {
            config.storage.path = dir.clone();
        }
        if let Some(dir) = &self.projects_dir {
            config.transcripts.projects_dir = dir.clone();
        }
        config
    }
}
