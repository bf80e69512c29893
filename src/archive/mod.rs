pub mod history;
mod manager;

pub use history::HistorySummary;
pub use manager::{read_event_log, ArchiveManager};
