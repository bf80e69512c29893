use std::collections::HashMap;

use super::timing::PairedInvocation;

pub const MAX_SUGGESTIONS: usize = 3;

/// A command repeated more often than this is worth batching
const REPEAT_THRESHOLD: usize = 2;

/// Peak context above which splitting the session pays off
const SPLIT_PEAK_TOKENS: u64 = 50_000;

pub const NO_FINDINGS: &str = "No major inefficiencies detected.";

/// Count Bash invocations by program name (first word of the command).
///
/// Sorted by count descending; ties keep first-seen order.
pub fn command_counts(invocations: &[PairedInvocation]) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for inv in invocations {
        if inv.tool != "Bash" {
            continue;
        }
        let command = match inv.command.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        let base = command
            .split_whitespace()
            .next()
            .unwrap_or(command)
            .to_string();
        let count = counts.entry(base.clone()).or_insert(0);
        if *count == 0 {
            order.push(base);
        }
        *count += 1;
    }

    let mut result: Vec<(String, usize)> = order
        .into_iter()
        .map(|base| {
            let count = counts.get(&base).copied().unwrap_or(0);
            (base, count)
        })
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1));
    result
}

/// Session-level recommendations, in fixed rule order
pub fn session_suggestions(command_counts: &[(String, usize)], peak_tokens: u64) -> Vec<String> {
    let mut suggestions = Vec::new();

    for (command, count) in command_counts.iter().take(MAX_SUGGESTIONS) {
        if *count > REPEAT_THRESHOLD {
            suggestions.push(format!(
                "You ran `{}` {} times mid-task; consider running it once at the end.",
                command, count
            ));
        }
    }

    if peak_tokens > SPLIT_PEAK_TOKENS {
        suggestions.push(format!(
            "At {}K peak context, splitting into 2 sessions saves ~50% cost.",
            peak_tokens / 1000
        ));
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    if suggestions.is_empty() {
        suggestions.push(NO_FINDINGS.to_string());
    }
    suggestions
}
