use std::collections::HashSet;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::types::{UsageRecord, UsageSummary};
use crate::jsonl::text_lines;

/// Marker the short summary box starts with, used to detect an already shown box
pub const SUMMARY_MARKER: &str = "\u{2713} Done \u{00b7}";

/// How many trailing transcript lines to inspect for a shown summary
const TAIL_LINES: usize = 30;

/// Longest assistant reply that still counts as "just the box"
const MAX_BOX_REPLY_CHARS: usize = 400;

/// Locate `<projects_dir>/<project>/<session_id>.jsonl`.
///
/// Only immediate subdirectories are searched. Empty or placeholder
/// session ids never match.
pub fn find_transcript(projects_dir: &Path, session_id: &str) -> Option<PathBuf> {
    if session_id.is_empty() || session_id == "unknown" {
        return None;
    }

    let entries = std::fs::read_dir(projects_dir).ok()?;
    let file_name = format!("{}.jsonl", session_id);

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let candidate = path.join(&file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

/// Parse a transcript and return deduplicated usage, or `None` when there is
/// nothing authoritative to report.
///
/// Streaming writes the same usage figures 1-4 times per request; only the
/// first record for each `requestId` is kept.
pub fn extract_usage(path: &Path) -> Option<UsageSummary> {
    let file = std::fs::File::open(path).ok()?;
    let reader = BufReader::new(file);

    let mut seen_requests: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for line in text_lines(reader) {
        let entry: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if entry.get("type").and_then(|v| v.as_str()) != Some("assistant") {
            continue;
        }

        let message = match entry.get("message") {
            Some(m) => m,
            None => continue,
        };

        let usage = match message.get("usage") {
            Some(u) => u,
            None => continue,
        };

        if let Some(request_id) = entry.get("requestId").and_then(|v| v.as_str()) {
            if !seen_requests.insert(request_id.to_string()) {
                continue;
            }
        }

        records.push(UsageRecord {
            timestamp: entry
                .get("timestamp")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            model: message
                .get("model")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            input_tokens: token_field(usage, "input_tokens"),
            output_tokens: token_field(usage, "output_tokens"),
            cache_creation_tokens: token_field(usage, "cache_creation_input_tokens"),
            cache_read_tokens: token_field(usage, "cache_read_input_tokens"),
        });
    }

    if records.is_empty() {
        return None;
    }

    Some(UsageSummary::from_records(records))
}

fn token_field(usage: &serde_json::Value, key: &str) -> u64 {
    usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Whether the newest assistant reply in the transcript is the summary box itself.
pub fn cost_box_already_shown(path: &Path) -> bool {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return false,
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);

    for line in lines[start..].iter().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if entry.get("type").and_then(|v| v.as_str()) != Some("assistant") {
            continue;
        }

        let text = entry
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| item.get("text").and_then(|t| t.as_str()).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        return text.chars().count() < MAX_BOX_REPLY_CHARS && text.contains(SUMMARY_MARKER);
    }

    false
}
