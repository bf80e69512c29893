use serde::Serialize;

use super::timing::PairedInvocation;
use crate::usage::{ContextPoint, RateCard, UsageSummary};

/// Which accounting regime produced a cost figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMode {
    /// Token counts from the session transcript
    Exact,
    /// Token counts estimated from hook payload sizes
    Estimated,
}

/// Token totals per class. Zero in estimated mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
}

/// Result shape shared by both cost models
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub mode: CostMode,
    pub total_cost: f64,
    pub peak_tokens: u64,
    pub api_calls: usize,
    pub tokens: TokenTotals,
    pub context_timeline: Vec<ContextPoint>,
}

/// Cost model, picked by whether transcript usage was found
#[derive(Debug, Clone)]
pub enum CostModel<'a> {
    Authoritative(&'a UsageSummary),
    Estimated { context_cap: u64 },
}

impl<'a> CostModel<'a> {
    pub fn select(usage: Option<&'a UsageSummary>, context_cap: u64) -> Self {
        match usage {
            Some(summary) => CostModel::Authoritative(summary),
            None => CostModel::Estimated { context_cap },
        }
    }

    pub fn mode(&self) -> CostMode {
        match self {
            CostModel::Authoritative(_) => CostMode::Exact,
            CostModel::Estimated { .. } => CostMode::Estimated,
        }
    }

    pub fn compute(&self, invocations: &[PairedInvocation], card: &RateCard) -> CostBreakdown {
        match self {
            CostModel::Authoritative(usage) => authoritative(usage, card),
            CostModel::Estimated { context_cap } => estimated(invocations, card, *context_cap),
        }
    }
}

fn authoritative(usage: &UsageSummary, card: &RateCard) -> CostBreakdown {
    let total_cost = card.cost(
        usage.input_tokens,
        usage.output_tokens,
        usage.cache_creation_tokens,
        usage.cache_read_tokens,
    );
    let context_timeline = usage.context_timeline();

    CostBreakdown {
        mode: CostMode::Exact,
        total_cost,
        peak_tokens: peak(&context_timeline),
        api_calls: usage.api_calls(),
        tokens: TokenTotals {
            input: usage.input_tokens,
            output: usage.output_tokens,
            cache_creation: usage.cache_creation_tokens,
            cache_read: usage.cache_read_tokens,
        },
        context_timeline,
    }
}

/// Estimate cost from hook-side sizes.
///
/// Every response token joins the context and is re-sent as input on each
/// remaining turn, so invocation `i` of `n` is billed its response once as
/// output plus `n - i` times as input.
fn estimated(invocations: &[PairedInvocation], card: &RateCard, context_cap: u64) -> CostBreakdown {
    let input_price = card.input / 1_000_000.0;
    let output_price = card.output / 1_000_000.0;

    let mut ordered: Vec<&PairedInvocation> = invocations.iter().collect();
    ordered.sort_by(|a, b| a.ts.total_cmp(&b.ts));

    let turn_count = ordered.len();
    let mut cumulative: u64 = 0;
    let mut total_cost = 0.0;
    let mut context_timeline = Vec::with_capacity(turn_count);

    for (i, inv) in ordered.iter().enumerate() {
        let added = inv.input_tokens.saturating_add(inv.response_tokens);
        cumulative = cumulative.saturating_add(added).min(context_cap);

        let turns_remaining = (turn_count - i) as f64;
        let response = inv.response_tokens as f64;
        total_cost += response * input_price * turns_remaining + response * output_price;

        context_timeline.push(ContextPoint {
            ts: format_epoch(inv.ts),
            tokens: cumulative,
        });
    }

    CostBreakdown {
        mode: CostMode::Estimated,
        total_cost,
        peak_tokens: peak(&context_timeline),
        api_calls: turn_count,
        tokens: TokenTotals::default(),
        context_timeline,
    }
}

fn peak(timeline: &[ContextPoint]) -> u64 {
    timeline.iter().map(|p| p.tokens).max().unwrap_or(0)
}

/// Render hook timestamps (epoch seconds) the way transcripts write theirs
fn format_epoch(ts: f64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis((ts * 1000.0).round() as i64)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::timing::Category;
    use crate::usage::UsageRecord;

    fn inv(ts: f64, input: u64, response: u64) -> PairedInvocation {
        PairedInvocation {
            tool: "Read".to_string(),
            category: Category::ReadingFiles,
            ts,
            elapsed_s: 1.0,
            input_tokens: input,
            response_tokens: response,
            file_path: None,
            command: None,
            matched: true,
        }
    }

    fn record(input: u64, output: u64, cc: u64, cr: u64) -> UsageRecord {
        UsageRecord {
            timestamp: "2026-02-05T10:00:00Z".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            input_tokens: input,
            output_tokens: output,
            cache_creation_tokens: cc,
            cache_read_tokens: cr,
        }
    }

    #[test]
    fn test_single_invocation_estimate() {
        let card = RateCard::fallback();
        let model = CostModel::select(None, 200_000);
        let breakdown = model.compute(&[inv(0.0, 100, 50)], &card);

        assert_eq!(breakdown.mode, CostMode::Estimated);
        // turns_remaining = 1: 50 * $3/M + 50 * $15/M
        let expected = 50.0 * 3e-6 + 50.0 * 15e-6;
        assert!((breakdown.total_cost - expected).abs() < 1e-12);
        assert_eq!(breakdown.peak_tokens, 150);
        assert_eq!(breakdown.api_calls, 1);
    }

    #[test]
    fn test_turns_remaining_weighting() {
        let card = RateCard::fallback();
        let breakdown = estimated(&[inv(2.0, 0, 10), inv(1.0, 0, 20)], &card, 200_000);
        // sorted by ts: 20 tokens with 2 turns left, then 10 tokens with 1
        let expected = 20.0 * 3e-6 * 2.0 + 20.0 * 15e-6 + 10.0 * 3e-6 + 10.0 * 15e-6;
        assert!((breakdown.total_cost - expected).abs() < 1e-12);
        let sizes: Vec<u64> = breakdown.context_timeline.iter().map(|p| p.tokens).collect();
        assert_eq!(sizes, vec![20, 30]);
    }

    #[test]
    fn test_context_is_capped() {
        let card = RateCard::fallback();
        let breakdown = estimated(
            &[inv(1.0, 40_000, 50_000), inv(2.0, 40_000, 50_000)],
            &card,
            100_000,
        );
        assert_eq!(breakdown.peak_tokens, 100_000);
        assert!(breakdown.context_timeline.iter().all(|p| p.tokens <= 100_000));
    }

    #[test]
    fn test_oversized_sizes_hit_the_cap() {
        let card = RateCard::fallback();
        let breakdown = estimated(&[inv(1.0, u64::MAX, u64::MAX), inv(2.0, 5, 5)], &card, 200_000);
        let sizes: Vec<u64> = breakdown.context_timeline.iter().map(|p| p.tokens).collect();
        assert_eq!(sizes, vec![200_000, 200_000]);
        assert_eq!(breakdown.peak_tokens, 200_000);
    }

    #[test]
    fn test_empty_estimate() {
        let breakdown = estimated(&[], &RateCard::fallback(), 200_000);
        assert_eq!(breakdown.total_cost, 0.0);
        assert_eq!(breakdown.peak_tokens, 0);
        assert!(breakdown.context_timeline.is_empty());
    }

    #[test]
    fn test_authoritative_cost() {
        let usage = UsageSummary::from_records(vec![
            record(1_000_000, 0, 0, 0),
            record(0, 1_000_000, 1_000_000, 1_000_000),
        ]);
        let breakdown = CostModel::select(Some(&usage), 200_000)
            .compute(&[inv(0.0, 999, 999)], &RateCard::fallback());

        assert_eq!(breakdown.mode, CostMode::Exact);
        assert!((breakdown.total_cost - 22.05).abs() < 1e-9);
        assert_eq!(breakdown.api_calls, 2);
        assert_eq!(breakdown.peak_tokens, 2_000_000);
        assert_eq!(breakdown.tokens.cache_read, 1_000_000);
    }

    #[test]
    fn test_authoritative_uses_derived_cache_rates() {
        let card = RateCard {
            input: 2.0,
            output: 10.0,
            cache_creation: None,
            cache_read: None,
        };
        let usage = UsageSummary::from_records(vec![record(0, 0, 1_000_000, 1_000_000)]);
        let breakdown = authoritative(&usage, &card);
        assert!((breakdown.total_cost - (2.5 + 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_peak_matches_timeline_max() {
        let usage = UsageSummary::from_records(vec![
            record(10, 0, 0, 500),
            record(10, 0, 0, 9_000),
            record(10, 0, 0, 100),
        ]);
        let breakdown = authoritative(&usage, &RateCard::fallback());
        let max = breakdown
            .context_timeline
            .iter()
            .map(|p| p.tokens)
            .max()
            .unwrap();
        assert_eq!(breakdown.peak_tokens, max);
        assert_eq!(max, 9_010);
    }

    #[test]
    fn test_cost_monotonic_in_tokens() {
        let card = RateCard::fallback();
        let low = estimated(&[inv(0.0, 0, 100)], &card, 200_000).total_cost;
        let high = estimated(&[inv(0.0, 0, 200)], &card, 200_000).total_cost;
        assert!(high >= low && low >= 0.0);

        let a = authoritative(&UsageSummary::from_records(vec![record(1, 1, 1, 1)]), &card);
        let b = authoritative(&UsageSummary::from_records(vec![record(1, 1, 1, 2)]), &card);
        assert!(b.total_cost >= a.total_cost);
    }

    #[test]
    fn test_format_epoch() {
        assert_eq!(format_epoch(0.0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_epoch(1.5), "1970-01-01T00:00:01.500Z");
    }
}
