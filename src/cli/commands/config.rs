use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::Config;

/// Show the effective configuration and the paths it resolves to
pub async fn run(config: Config) -> Result<()> {
    println!("\n{}", "  Effective configuration".bold().bright_yellow());
    println!("{}", "  ─────────────────────────────".dimmed());
    println!("  {} {}", "Sessions:".bold(), config.sessions_dir().display());
    println!("  {} {}", "Pricing:".bold(), config.pricing_path().display());
    println!("  {} {}", "Transcripts:".bold(), config.projects_dir().display());
    println!();
    println!("{}", config.to_toml().context("failed to render configuration")?);
    Ok(())
}
