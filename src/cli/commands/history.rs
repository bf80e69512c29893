use anyhow::Result;
use chrono::Local;
use colored::Colorize;

use crate::archive::{ArchiveManager, HistorySummary};
use crate::config::Config;

/// Show cost totals over archived sessions from the last `days` days
pub async fn run(config: Config, days: i64) -> Result<()> {
    let manager = ArchiveManager::new(&config);
    let records = manager.read_history();

    println!(
        "\n{}",
        format!("  Session costs (last {} days)", days)
            .bold()
            .bright_yellow()
    );
    println!("{}", "  ─────────────────────────────".dimmed());

    if records.is_empty() {
        println!("\n  {}", "No session history found. Run a task first.".dimmed());
        return Ok(());
    }

    let Some(summary) = HistorySummary::collect(&records, days, Local::now()) else {
        println!(
            "\n  {}",
            format!("No sessions found in the last {} days.", days).dimmed()
        );
        return Ok(());
    };

    println!(
        "\n  {} {} sessions, {} tool calls",
        "Overview:".bold(),
        summary.sessions.to_string().bright_yellow(),
        summary.total_tool_calls.to_string().bright_yellow()
    );
    println!(
        "  {} ~${:.4} total, ~${:.4} per session",
        "Cost:".bold(),
        summary.total_cost,
        summary.avg_cost
    );
    println!(
        "  {} {}K tokens",
        "Peak context:".bold(),
        summary.peak_tokens / 1000
    );

    println!("\n  {}", "Daily breakdown:".bold());
    let max_cost = summary
        .daily
        .iter()
        .map(|d| d.cost)
        .fold(0.0_f64, f64::max);
    for day in &summary.daily {
        let bar_len = if max_cost > 0.0 {
            ((day.cost / max_cost) * 30.0).round() as usize
        } else {
            0
        };
        println!(
            "  {} {} {} {}",
            day.date.dimmed(),
            "\u{2588}".repeat(bar_len).bright_yellow(),
            format!("~${:.4}", day.cost),
            format!("({} sessions)", day.sessions).dimmed()
        );
    }
    println!();

    Ok(())
}
