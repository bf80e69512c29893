use anyhow::Result;
use colored::Colorize;

use crate::archive::{history, ArchiveManager};
use crate::config::Config;

/// Print recommendations drawn from recent session history
pub async fn run(config: Config) -> Result<()> {
    let records = ArchiveManager::new(&config).read_history();

    println!("\n{}", "  Things worth changing".bold().bright_yellow());
    println!("{}", "  ─────────────────────────────".dimmed());

    if records.is_empty() {
        println!("\n  {}", "No session history to analyse yet.".dimmed());
        return Ok(());
    }

    for (i, suggestion) in history::pattern_suggestions(&records).iter().enumerate() {
        println!("  {} {}", format!("{}.", i + 1).cyan(), suggestion);
    }
    println!();

    Ok(())
}
