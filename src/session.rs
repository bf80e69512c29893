use std::path::{Path, PathBuf};

use crate::analysis::{self, SessionAnalysis};
use crate::archive::{read_event_log, ArchiveManager};
use crate::config::Config;
use crate::events::InstrumentationEvent;
use crate::report;
use crate::usage::{scanner, PricingTable};

/// Everything one analysis pass needs, loaded once per process
pub struct SessionContext {
    pub config: Config,
    pub manager: ArchiveManager,
    pub pricing: PricingTable,
}

impl SessionContext {
    pub fn new(config: Config) -> Self {
        let manager = ArchiveManager::new(&config);
        let pricing = PricingTable::load(&config.pricing_path());
        SessionContext {
            config,
            manager,
            pricing,
        }
    }

    pub fn transcript_for(&self, session_id: &str) -> Option<PathBuf> {
        scanner::find_transcript(&self.config.projects_dir(), session_id)
    }

    /// Analyse events, using the session transcript when one can be found
    pub fn analyse_events(
        &self,
        session_id: &str,
        events: &[InstrumentationEvent],
    ) -> Option<SessionAnalysis> {
        let usage = self
            .transcript_for(session_id)
            .and_then(|path| scanner::extract_usage(&path));
        if usage.is_none() {
            tracing::debug!(
                "No transcript usage for {}, estimating",
                session_id
            );
        }
        analysis::analyse(session_id, events, &self.pricing, usage.as_ref())
    }

    /// Active log for `session_id` if it exists, else the most recent one
    pub fn resolve_active_log(&self, session_id: Option<&str>) -> Option<PathBuf> {
        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            let candidate = self.manager.active_log_path(id);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        self.manager.latest_active_log()
    }

    pub fn analyse_log(&self, path: &Path) -> Option<SessionAnalysis> {
        let events = read_event_log(path);
        let session_id = events
            .iter()
            .map(|e| e.session_id())
            .find(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| session_id_from_path(path))
            .unwrap_or_default();
        self.analyse_events(&session_id, &events)
    }

    /// Full report text for a session, or a hint when there is nothing to show
    pub fn report_text(&self, session_id: Option<&str>) -> String {
        let Some(path) = self.resolve_active_log(session_id) else {
            return "No active session data found. Run /cost after starting a task.".to_string();
        };
        match self.analyse_log(&path) {
            Some(analysis) => report::full_report(&analysis),
            None => "No session data recorded. Run a task first.".to_string(),
        }
    }

    /// Short summary of the most recently active session
    pub fn inline_text(&self) -> String {
        self.manager
            .latest_active_log()
            .and_then(|path| self.analyse_log(&path))
            .map(|analysis| report::short_summary(&analysis))
            .unwrap_or_else(|| "*(no session data)*".to_string())
    }
}

fn session_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.strip_prefix("active-").unwrap_or(stem).to_string())
}
