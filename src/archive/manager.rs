use std::fs::{self, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};

use super::history::HistoryRecord;
use crate::analysis::SessionAnalysis;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::events::InstrumentationEvent;
use crate::jsonl::text_lines;

const ACTIVE_PREFIX: &str = "active-";
const LOG_EXTENSION: &str = "jsonl";
const ORPHANED_DIR: &str = "orphaned";
const HISTORY_FILE: &str = "history.jsonl";
const PENDING_SUMMARY_FILE: &str = "last-cost.txt";

/// Owns the on-disk session state:
///
/// ```text
/// sessions/
///   active-<session>.jsonl      events for a running session
///   <timestamp>-<session>.jsonl archived event logs
///   orphaned/                   active logs that never saw a stop
///   history.jsonl               one record per archived session
///   last-cost.txt               summary waiting for the next prompt
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    sessions_dir: PathBuf,
}

impl ArchiveManager {
    pub fn new(config: &Config) -> Self {
        Self::with_dir(config.sessions_dir())
    }

    pub fn with_dir(sessions_dir: impl Into<PathBuf>) -> Self {
        ArchiveManager {
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn orphaned_dir(&self) -> PathBuf {
        self.sessions_dir.join(ORPHANED_DIR)
    }

    pub fn history_path(&self) -> PathBuf {
        self.sessions_dir.join(HISTORY_FILE)
    }

    pub fn active_log_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!(
            "{}{}.{}",
            ACTIVE_PREFIX,
            sanitize(session_id),
            LOG_EXTENSION
        ))
    }

    fn ensure_dirs(&self) -> Result<()> {
        let orphaned = self.orphaned_dir();
        fs::create_dir_all(&orphaned).map_err(|e| TrackerError::io(&orphaned, e))
    }

    /// Append one event to its session's active log.
    ///
    /// The record and its newline go out in a single write on an
    /// append-mode handle, so concurrent hooks never interleave partial lines.
    pub fn append(&self, event: &InstrumentationEvent) -> Result<()> {
        self.ensure_dirs()?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        append_line(&self.active_log_path(event.session_id()), &line)?;
        tracing::debug!(
            "Recorded {} event for {}",
            event.tool(),
            event.session_id()
        );
        Ok(())
    }

    /// Events for a session in log order; missing log means no events
    pub fn read_events(&self, session_id: &str) -> Vec<InstrumentationEvent> {
        read_event_log(&self.active_log_path(session_id))
    }

    /// Most recently modified active log, if any
    pub fn latest_active_log(&self) -> Option<PathBuf> {
        self.active_logs()
            .into_iter()
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((modified, path))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }

    fn active_logs(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION)
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(ACTIVE_PREFIX))
            })
            .collect()
    }

    /// Move active logs untouched for longer than `retention` into `orphaned/`.
    ///
    /// Returns how many logs were moved. Files are never deleted here.
    pub fn sweep_orphans(&self, retention: Duration, now: SystemTime) -> Result<usize> {
        let cutoff = match now.checked_sub(retention) {
            Some(c) => c,
            None => return Ok(0),
        };
        self.ensure_dirs()?;

        let mut moved = 0;
        for path in self.active_logs() {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if modified >= cutoff {
                continue;
            }
            let Some(name) = path.file_name() else {
                continue;
            };
            let target = self.orphaned_dir().join(name);
            fs::rename(&path, &target).map_err(|e| TrackerError::io(&path, e))?;
            tracing::info!("Orphaned session log moved: {}", target.display());
            moved += 1;
        }
        Ok(moved)
    }

    /// Archive a finished session: copy its active log to a timestamped file,
    /// remove the active log, and append a history record.
    ///
    /// A missing active log (already archived) skips the copy. The history
    /// record is appended regardless, so a repeated stop for the same session
    /// produces a second record.
    pub fn archive(
        &self,
        analysis: &SessionAnalysis,
        now: DateTime<Local>,
    ) -> Result<HistoryRecord> {
        self.ensure_dirs()?;

        let archive_path = self.sessions_dir.join(format!(
            "{}-{}.{}",
            now.format("%Y-%m-%d-%H-%M-%S"),
            sanitize(&analysis.session_id),
            LOG_EXTENSION
        ));

        let source = self.active_log_path(&analysis.session_id);
        if source.exists() {
            fs::copy(&source, &archive_path).map_err(|e| TrackerError::io(&source, e))?;
            fs::remove_file(&source).map_err(|e| TrackerError::io(&source, e))?;
        } else {
            tracing::debug!(
                "No active log for {}, nothing to copy",
                analysis.session_id
            );
        }

        let record = HistoryRecord::from_analysis(analysis, &archive_path, now);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        append_line(&self.history_path(), &line)?;

        Ok(record)
    }

    pub fn read_history(&self) -> Vec<HistoryRecord> {
        super::history::read_history(&self.history_path())
    }

    /// Keep a summary box for the next prompt
    pub fn save_pending_summary(&self, summary: &str) -> Result<()> {
        self.ensure_dirs()?;
        let path = self.sessions_dir.join(PENDING_SUMMARY_FILE);
        fs::write(&path, summary).map_err(|e| TrackerError::io(&path, e))
    }

    /// Take the pending summary, removing it so it is shown once
    pub fn take_pending_summary(&self) -> Option<String> {
        let path = self.sessions_dir.join(PENDING_SUMMARY_FILE);
        let content = fs::read_to_string(&path).ok()?;
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("Failed to consume pending summary: {}", e);
        }
        let content = content.trim();
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}

/// Read an event log, skipping blank and unparsable lines
pub fn read_event_log(path: &Path) -> Vec<InstrumentationEvent> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };

    text_lines(BufReader::new(file))
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TrackerError::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| TrackerError::io(path, e))
}

/// Encode a session id as a file name component.
///
/// ASCII alphanumerics and `-` pass through; every other byte becomes `_xx`
/// (lowercase hex). `_` only ever starts an escape, so distinct ids never
/// share a file and no id can escape the sessions directory.
fn sanitize(session_id: &str) -> String {
    let mut out = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02x}", byte));
        }
    }
    out
}
