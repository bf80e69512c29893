pub mod cost;
pub mod suggestions;
pub mod timing;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::events::InstrumentationEvent;
use crate::usage::{ContextPoint, PriceSource, PricingTable, RateCard, UsageSummary};

pub use cost::{CostMode, CostModel, TokenTotals};
pub use timing::{Category, PairedInvocation};

/// Model assumed when neither the transcript nor the hooks name one
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

/// Everything computed for one session. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub session_id: String,
    pub duration_s: f64,
    pub total_cost: f64,
    pub peak_tokens: u64,
    pub tool_calls: usize,
    pub api_calls: usize,
    pub time_by_category: BTreeMap<Category, f64>,
    pub context_timeline: Vec<ContextPoint>,
    pub suggestions: Vec<String>,
    pub mode: CostMode,
    pub model: String,
    pub rate_card: RateCard,
    pub price_source: PriceSource,
    pub tokens: TokenTotals,
    /// Read counts per file path, most-read first
    pub file_reads: Vec<(String, usize)>,
    pub command_counts: Vec<(String, usize)>,
}

impl SessionAnalysis {
    pub fn using_real_data(&self) -> bool {
        self.mode == CostMode::Exact
    }

    /// Total elapsed time across categories, never zero so it can divide
    pub fn total_timed(&self) -> f64 {
        let total: f64 = self.time_by_category.values().sum();
        if total > 0.0 {
            total
        } else {
            1.0
        }
    }
}

/// Run the full pipeline over one session's events.
///
/// `usage` is the transcript extract, when one was found. Returns `None` for
/// an empty event log. The result depends only on its inputs.
pub fn analyse(
    session_id: &str,
    events: &[InstrumentationEvent],
    pricing: &PricingTable,
    usage: Option<&UsageSummary>,
) -> Option<SessionAnalysis> {
    if events.is_empty() {
        return None;
    }

    let reconciled = timing::reconcile(events);

    let model = match usage {
        Some(summary) if !summary.model.is_empty() => summary.model.clone(),
        Some(_) => DEFAULT_MODEL.to_string(),
        None => events
            .iter()
            .find_map(|e| e.model())
            .unwrap_or(DEFAULT_MODEL)
            .to_string(),
    };
    let resolved = pricing.resolve(&model);

    let cost_model = CostModel::select(usage, pricing.context_window_cap_tokens);
    let breakdown = cost_model.compute(&reconciled.invocations, &resolved.card);
    tracing::debug!(
        "session {} priced as {:?} via {:?}",
        session_id,
        cost_model.mode(),
        resolved.source
    );

    let command_counts = suggestions::command_counts(&reconciled.invocations);
    let suggestions = suggestions::session_suggestions(&command_counts, breakdown.peak_tokens);

    Some(SessionAnalysis {
        session_id: session_id.to_string(),
        duration_s: duration(events),
        total_cost: breakdown.total_cost,
        peak_tokens: breakdown.peak_tokens,
        tool_calls: reconciled.invocations.len(),
        api_calls: breakdown.api_calls,
        time_by_category: reconciled.time_by_category,
        context_timeline: breakdown.context_timeline,
        suggestions,
        mode: breakdown.mode,
        model,
        rate_card: resolved.card,
        price_source: resolved.source,
        tokens: breakdown.tokens,
        file_reads: file_reads(&reconciled.invocations),
        command_counts,
    })
}

fn duration(events: &[InstrumentationEvent]) -> f64 {
    if events.len() < 2 {
        return 0.0;
    }
    let min = events.iter().map(|e| e.ts()).fold(f64::INFINITY, f64::min);
    let max = events.iter().map(|e| e.ts()).fold(f64::NEG_INFINITY, f64::max);
    max - min
}

fn file_reads(invocations: &[PairedInvocation]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for inv in invocations {
        if inv.tool != "Read" {
            continue;
        }
        if let Some(path) = inv.file_path.as_deref().filter(|p| !p.is_empty()) {
            *counts.entry(path).or_insert(0) += 1;
        }
    }
    let mut result: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(path, count)| (path.to_string(), count))
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}
