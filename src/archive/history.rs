use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::Path;

use crate::analysis::suggestions::MAX_SUGGESTIONS;
use crate::analysis::SessionAnalysis;
use crate::jsonl::text_lines;

/// Sessions considered by cross-session suggestions
const RECENT_SESSIONS: usize = 20;
const HIGH_AVG_PEAK_TOKENS: f64 = 80_000.0;
const EXPENSIVE_SHARE: f64 = 0.3;
const HIGH_AVG_COST: f64 = 0.10;

/// Compact per-session line in `history.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Local time of archival, RFC 3339
    pub date: String,
    pub session_id: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub peak_tokens: u64,
    #[serde(default)]
    pub tool_calls: usize,
    #[serde(default)]
    pub api_calls: usize,
    #[serde(default)]
    pub using_real_data: bool,
    #[serde(default)]
    pub archive: String,
}

impl HistoryRecord {
    pub fn from_analysis(
        analysis: &SessionAnalysis,
        archive_path: &Path,
        now: DateTime<Local>,
    ) -> Self {
        HistoryRecord {
            date: now.to_rfc3339(),
            session_id: analysis.session_id.clone(),
            duration_ms: (analysis.duration_s * 1000.0).max(0.0) as u64,
            total_cost: (analysis.total_cost * 1_000_000.0).round() / 1_000_000.0,
            peak_tokens: analysis.peak_tokens,
            tool_calls: analysis.tool_calls,
            api_calls: analysis.api_calls,
            using_real_data: analysis.using_real_data(),
            archive: archive_path.to_string_lossy().to_string(),
        }
    }

    /// Archival time, accepting RFC 3339 or a naive local timestamp
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(dt.with_timezone(&Local));
        }
        NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    }

    /// `YYYY-MM-DD` as written at archival time
    pub fn day(&self) -> &str {
        self.date.get(..10).unwrap_or(&self.date)
    }
}

/// Read the history log, skipping lines that fail to parse
pub fn read_history(path: &Path) -> Vec<HistoryRecord> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };

    text_lines(BufReader::new(file))
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: String,
    pub sessions: usize,
    pub cost: f64,
}

/// Totals over a recent window of history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub days: i64,
    pub sessions: usize,
    pub total_cost: f64,
    pub avg_cost: f64,
    pub total_tool_calls: usize,
    pub peak_tokens: u64,
    /// Most recent day first
    pub daily: Vec<DayTotal>,
}

impl HistorySummary {
    /// Summarize records archived within `days` of `now`; `None` when the window is empty.
    ///
    /// A window reaching past the representable date range covers every record.
    pub fn collect(records: &[HistoryRecord], days: i64, now: DateTime<Local>) -> Option<Self> {
        let cutoff = Duration::try_days(days).and_then(|span| now.checked_sub_signed(span));
        let recent: Vec<&HistoryRecord> = records
            .iter()
            .filter(|r| {
                r.timestamp()
                    .is_some_and(|ts| cutoff.map_or(true, |cutoff| ts >= cutoff))
            })
            .collect();

        if recent.is_empty() {
            return None;
        }

        let total_cost: f64 = recent.iter().map(|r| r.total_cost).sum();
        let total_tool_calls = recent
            .iter()
            .fold(0usize, |acc, r| acc.saturating_add(r.tool_calls));
        let peak_tokens = recent.iter().map(|r| r.peak_tokens).max().unwrap_or(0);

        let mut by_day: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for record in recent.iter().copied() {
            let entry = by_day.entry(record.day()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += record.total_cost;
        }
        let daily = by_day
            .into_iter()
            .rev()
            .map(|(date, (sessions, cost))| DayTotal {
                date: date.to_string(),
                sessions,
                cost,
            })
            .collect();

        Some(HistorySummary {
            days,
            sessions: recent.len(),
            total_cost,
            avg_cost: total_cost / recent.len() as f64,
            total_tool_calls,
            peak_tokens,
            daily,
        })
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("  Sessions in last {} days: {}", self.days, self.sessions),
            format!("  Total cost: ~${:.4}", self.total_cost),
            format!("  Avg cost per session: ~${:.4}", self.avg_cost),
            format!("  Total tool calls: {}", self.total_tool_calls),
            format!(
                "  Peak context (any session): {}K tokens",
                self.peak_tokens / 1000
            ),
            String::new(),
            "  Daily breakdown:".to_string(),
        ];
        for day in &self.daily {
            lines.push(format!(
                "    {}  {} session(s)  ~${:.4}",
                day.date, day.sessions, day.cost
            ));
        }
        lines.join("\n")
    }
}

/// Text answer for a history query over `days`
pub fn history_report(records: &[HistoryRecord], days: i64, now: DateTime<Local>) -> String {
    if records.is_empty() {
        return "No session history found. Run a task first.".to_string();
    }
    match HistorySummary::collect(records, days, now) {
        Some(summary) => summary.render(),
        None => format!("No sessions found in the last {} days.", days),
    }
}

/// Cross-session recommendations over the most recent sessions
pub fn pattern_suggestions(records: &[HistoryRecord]) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }

    let recent = &records[records.len().saturating_sub(RECENT_SESSIONS)..];
    let count = recent.len() as f64;
    let avg_cost = recent.iter().map(|r| r.total_cost).sum::<f64>() / count;
    let avg_peak = recent.iter().map(|r| r.peak_tokens as f64).sum::<f64>() / count;
    let expensive = recent
        .iter()
        .filter(|r| r.total_cost > avg_cost * 2.0)
        .count();

    let mut suggestions = Vec::new();
    if avg_peak > HIGH_AVG_PEAK_TOKENS {
        suggestions.push(format!(
            "Average peak context is {:.0}K tokens. Split long tasks into 2 sessions to roughly halve cost.",
            (avg_peak / 1000.0).floor()
        ));
    }
    if expensive as f64 > count * EXPENSIVE_SHARE {
        suggestions.push(format!(
            "{} of {} recent sessions cost 2x above average. Check the session report after expensive sessions to see which files drove the cost.",
            expensive,
            recent.len()
        ));
    }
    if avg_cost > HIGH_AVG_COST {
        suggestions.push(format!(
            "Average session cost is ${:.3}. Ask for only the files that are strictly needed to reduce file reads.",
            avg_cost
        ));
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    if suggestions.is_empty() {
        suggestions.push(format!(
            "Sessions look efficient. Avg cost: ${:.4}, avg peak context: {:.0}K tokens.",
            avg_cost,
            (avg_peak / 1000.0).floor()
        ));
    }
    suggestions
}

/// Text answer for a suggestions query
pub fn suggestions_report(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "No session history to analyse yet.".to_string();
    }
    pattern_suggestions(records)
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, cost: f64, peak: u64) -> HistoryRecord {
        HistoryRecord {
            date: date.to_string(),
            session_id: "s".to_string(),
            duration_ms: 1000,
            total_cost: cost,
            peak_tokens: peak,
            tool_calls: 2,
            api_calls: 3,
            using_real_data: true,
            archive: String::new(),
        }
    }

    fn local(s: &str) -> DateTime<Local> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn test_naive_and_rfc3339_dates_parse() {
        assert!(record("2026-02-05T10:00:00.123456", 0.0, 0).timestamp().is_some());
        assert!(record("2026-02-05T10:00:00+02:00", 0.0, 0).timestamp().is_some());
        assert!(record("yesterday", 0.0, 0).timestamp().is_none());
        assert_eq!(record("2026-02-05T10:00:00", 0.0, 0).day(), "2026-02-05");
    }

    #[test]
    fn test_three_days_in_window() {
        let now = local("2026-02-10T12:00:00");
        let records = vec![
            record("2026-02-08T09:00:00", 0.10, 1000),
            record("2026-02-09T09:00:00", 0.20, 5000),
            record("2026-02-09T15:00:00", 0.30, 2000),
            record("2026-02-10T08:00:00", 0.05, 1000),
            record("2026-01-01T08:00:00", 9.99, 99_000),
        ];

        let summary = HistorySummary::collect(&records, 7, now).unwrap();
        assert_eq!(summary.sessions, 4);
        assert_eq!(summary.peak_tokens, 5000);
        assert!((summary.total_cost - 0.65).abs() < 1e-9);

        let days: Vec<&str> = summary.daily.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(days, vec!["2026-02-10", "2026-02-09", "2026-02-08"]);
        assert_eq!(summary.daily[1].sessions, 2);
        assert!((summary.daily[1].cost - 0.50).abs() < 1e-9);
        assert_eq!(summary.daily[0].sessions, 1);
    }

    #[test]
    fn test_huge_window_covers_everything() {
        let now = local("2026-02-10T12:00:00");
        let records = vec![
            record("2026-02-09T09:00:00", 0.20, 5000),
            record("1999-01-01T08:00:00", 0.30, 2000),
        ];

        for days in [1_000_000_000, 200_000_000_000, i64::MAX] {
            let summary = HistorySummary::collect(&records, days, now).unwrap();
            assert_eq!(summary.sessions, 2);
        }
        assert!(history_report(&records, i64::MAX, now).contains("Sessions in last"));
    }

    #[test]
    fn test_history_reader_skips_non_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("2026-02-09T09:00:00", 0.2, 10)).unwrap();
        let mut data = format!("{}\n", good).into_bytes();
        data.extend_from_slice(b"{\"session_id\":\"\xff\"}\n");
        data.extend_from_slice(format!("{}\n{}\n", good, good).as_bytes());
        std::fs::write(&path, data).unwrap();

        assert_eq!(read_history(&path).len(), 3);
    }

    #[test]
    fn test_empty_window_message() {
        let now = local("2026-02-10T12:00:00");
        let records = vec![record("2025-01-01T00:00:00", 1.0, 0)];
        assert_eq!(
            history_report(&records, 7, now),
            "No sessions found in the last 7 days."
        );
        assert!(history_report(&[], 7, now).starts_with("No session history"));
    }

    #[test]
    fn test_render_lists_days() {
        let now = local("2026-02-10T12:00:00");
        let records = vec![record("2026-02-10T08:00:00", 0.05, 1000)];
        let text = history_report(&records, 7, now);
        assert!(text.contains("Sessions in last 7 days: 1"));
        assert!(text.contains("2026-02-10  1 session(s)  ~$0.0500"));
    }

    #[test]
    fn test_efficient_sessions_fallback() {
        let records = vec![record("d", 0.01, 1000), record("d", 0.01, 1000)];
        let suggestions = pattern_suggestions(&records);
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].starts_with("Sessions look efficient"));
    }

    #[test]
    fn test_each_rule_fires_independently() {
        let high_peak = vec![record("d", 0.01, 90_000)];
        assert!(pattern_suggestions(&high_peak)[0].contains("Average peak context is 90K"));

        let pricey = vec![record("d", 0.50, 0)];
        assert!(pattern_suggestions(&pricey)[0].contains("Average session cost is $0.500"));

        let mut skewed = vec![record("d", 0.0, 0); 6];
        skewed.extend(vec![record("d", 0.05, 0); 4]);
        let suggestions = pattern_suggestions(&skewed);
        // avg 0.02: the four 0.05 sessions are above 2x average (40% > 30%)
        assert!(suggestions[0].starts_with("4 of 10 recent sessions"));
    }

    #[test]
    fn test_only_recent_twenty_considered() {
        let mut records = vec![record("d", 5.0, 0); 5];
        records.extend(vec![record("d", 0.01, 0); 20]);
        let suggestions = pattern_suggestions(&records);
        assert!(suggestions[0].starts_with("Sessions look efficient"));
    }

    #[test]
    fn test_read_history_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("2026-02-10T08:00:00", 0.05, 1)).unwrap();
        std::fs::write(&path, format!("{}\n{{broken\n\n{}\n", good, good)).unwrap();
        assert_eq!(read_history(&path).len(), 2);
    }
}
