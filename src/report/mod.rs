//! Plain-text renderings of a [`SessionAnalysis`].
//!
//! Output is meant to be pasted verbatim into a chat reply, so no colors or
//! terminal escapes are used here.

use std::path::Path;

use crate::analysis::{SessionAnalysis, TokenTotals};
use crate::usage::{scanner::SUMMARY_MARKER, RateCard};

const RULE_WIDTH: usize = 57;
const BAR_WIDTH: usize = 12;
const MAX_FILES_SHOWN: usize = 8;

pub fn fmt_duration(seconds: f64) -> String {
    let s = seconds.max(0.0) as u64;
    if s < 60 {
        format!("{}s", s)
    } else {
        format!("{}m {:02}s", s / 60, s % 60)
    }
}

pub fn fmt_tokens(n: u64) -> String {
    if n >= 1000 {
        format!("{:.1}K", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

pub fn bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * width as f64).round() as usize;
    format!("{}{}", "\u{2588}".repeat(filled), " ".repeat(width - filled))
}

fn cost_prefix(analysis: &SessionAnalysis) -> &'static str {
    if analysis.using_real_data() {
        "$"
    } else {
        "~$"
    }
}

fn rule() -> String {
    format!("  {}", "\u{2500}".repeat(RULE_WIDTH))
}

/// Categories by time spent, longest first
fn ranked_categories(analysis: &SessionAnalysis) -> Vec<(&'static str, f64)> {
    let mut ranked: Vec<(&'static str, f64)> = analysis
        .time_by_category
        .iter()
        .map(|(category, secs)| (category.label(), *secs))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Boxed one-glance summary shown when a session stops
pub fn short_summary(analysis: &SessionAnalysis) -> String {
    let header = format!(
        "  {} {} \u{00b7} {}{:.4} \u{00b7} Peak: {} tokens  ",
        SUMMARY_MARKER,
        fmt_duration(analysis.duration_s),
        cost_prefix(analysis),
        analysis.total_cost,
        fmt_tokens(analysis.peak_tokens)
    );
    let width = header.chars().count();

    let categories = ranked_categories(analysis)
        .into_iter()
        .take(2)
        .map(|(label, secs)| format!("{} {}", label, fmt_duration(secs)))
        .collect::<Vec<_>>()
        .join("   ");

    let line = |text: &str| format!("\u{2551}  {:<pad$}\u{2551}", text, pad = width - 2);
    let edge = "\u{2550}".repeat(width);

    [
        format!("\u{2554}{}\u{2557}", edge),
        format!("\u{2551}{}\u{2551}", header),
        format!("\u{2560}{}\u{2563}", edge),
        line(&categories),
        line("Run /cost for full breakdown"),
        format!("\u{255a}{}\u{255d}", edge),
    ]
    .join("\n")
}

/// Multi-section report for a session
pub fn full_report(analysis: &SessionAnalysis) -> String {
    let prefix = cost_prefix(analysis);
    let header = format!(
        "  Task done \u{00b7} {} \u{00b7} Cost: {}{:.4} \u{00b7} Peak: {} tokens  ",
        fmt_duration(analysis.duration_s),
        prefix,
        analysis.total_cost,
        fmt_tokens(analysis.peak_tokens)
    );
    let edge = "\u{2550}".repeat(header.chars().count());
    let mut lines = vec![
        format!("\u{2554}{}\u{2557}", edge),
        format!("\u{2551}{}\u{2551}", header),
        format!("\u{255a}{}\u{255d}", edge),
        String::new(),
    ];

    lines.push("  Time breakdown".to_string());
    lines.push(rule());
    let total_timed = analysis.total_timed();
    for (label, secs) in ranked_categories(analysis) {
        let fraction = secs / total_timed;
        lines.push(format!(
            "  {:<28}  {:>7}  {}  {}%",
            label,
            fmt_duration(secs),
            bar(fraction, BAR_WIDTH),
            (fraction * 100.0) as u64
        ));
    }
    lines.push(String::new());

    lines.push("  Cost breakdown".to_string());
    lines.push(rule());
    if analysis.using_real_data() {
        push_token_table(&mut lines, analysis);
        push_file_reads(&mut lines, analysis);
    } else {
        lines.push("  (Estimated \u{00b7} session transcript not found)".to_string());
        lines.push(format!("  Estimated total cost: ~${:.4}", analysis.total_cost));
        lines.push(String::new());
    }

    let timeline = &analysis.context_timeline;
    if timeline.len() >= 2 {
        let end = timeline[timeline.len() - 1].tokens;
        lines.push("  Context window growth".to_string());
        lines.push(rule());
        lines.push(format!("  Start  \u{2192}  {:>8} tokens", fmt_tokens(timeline[0].tokens)));
        lines.push(format!(
            "  Mid    \u{2192}  {:>8} tokens",
            fmt_tokens(timeline[timeline.len() / 2].tokens)
        ));
        lines.push(format!("  End    \u{2192}  {:>8} tokens", fmt_tokens(end)));
        lines.push(format!("  Peak   \u{2192}  {:>8} tokens", fmt_tokens(analysis.peak_tokens)));
        lines.push(String::new());
    }

    lines.push("  Things worth changing".to_string());
    lines.push(rule());
    for (i, suggestion) in analysis.suggestions.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, suggestion));
    }
    lines.push(String::new());

    lines.join("\n")
}

fn push_token_table(lines: &mut Vec<String>, analysis: &SessionAnalysis) {
    let card = &analysis.rate_card;
    let tokens = &analysis.tokens;
    let rows = [
        ("Input (uncached)", tokens.input, card.input),
        ("Output", tokens.output, card.output),
        ("Cache write (creation)", tokens.cache_creation, card.cache_creation_rate()),
        ("Cache read", tokens.cache_read, card.cache_read_rate()),
    ];

    lines.push(format!(
        "  {:<28}  {:>9}  {:>8}  {:>8}",
        "Token type", "Tokens", "Rate/M", "Cost"
    ));
    lines.push(rule());
    for (label, count, rate) in rows {
        lines.push(format!(
            "  {:<28}  {:>9}  ${:>6.2}  ${:>7.4}",
            label,
            fmt_tokens(count),
            rate,
            count as f64 * rate / 1_000_000.0
        ));
    }
    lines.push(rule());
    lines.push(format!(
        "  {:<28}  {:>9}  {:>8}  ${:>7.4}",
        "TOTAL", "", "", analysis.total_cost
    ));
    lines.push(String::new());

    lines.push(format!(
        "  Model: {}   API calls: {}   Cache saved you: ${:.4} vs all-input pricing",
        analysis.model,
        analysis.api_calls,
        cache_savings(tokens, card)
    ));
    lines.push(String::new());
}

/// What cache reads saved against paying the input rate for the same tokens.
///
/// Cache writes are billed above the input rate, so they save nothing and
/// are left out.
fn cache_savings(tokens: &TokenTotals, card: &RateCard) -> f64 {
    tokens.cache_read as f64 * (card.input - card.cache_read_rate()).max(0.0) / 1_000_000.0
}

fn push_file_reads(lines: &mut Vec<String>, analysis: &SessionAnalysis) {
    if analysis.file_reads.is_empty() {
        return;
    }
    lines.push(format!("  {:<40}  {:>5}", "Files read", "Reads"));
    lines.push(format!("  {}", "\u{2500}".repeat(48)));
    for (path, reads) in analysis.file_reads.iter().take(MAX_FILES_SHOWN) {
        let name: String = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone())
            .chars()
            .take(38)
            .collect();
        lines.push(format!("  {:<40}  {:>5}", name, reads));
    }
    lines.push(String::new());
}
