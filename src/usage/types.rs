use serde::{Deserialize, Serialize};

/// Token usage for a single API call, taken from the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageRecord {
    /// Tokens the request carried: uncached input plus both cache classes
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_creation_tokens)
            .saturating_add(self.cache_read_tokens)
    }
}

/// One point on the context-size timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPoint {
    pub ts: String,
    pub tokens: u64,
}

/// Deduplicated usage for one session
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Most recent non-empty model name
    pub model: String,
    pub records: Vec<UsageRecord>,
}

impl UsageSummary {
    pub fn from_records(records: Vec<UsageRecord>) -> Self {
        let model = records
            .iter()
            .rev()
            .find(|r| !r.model.is_empty())
            .map(|r| r.model.clone())
            .unwrap_or_default();

        UsageSummary {
            input_tokens: saturating_total(&records, |r| r.input_tokens),
            output_tokens: saturating_total(&records, |r| r.output_tokens),
            cache_creation_tokens: saturating_total(&records, |r| r.cache_creation_tokens),
            cache_read_tokens: saturating_total(&records, |r| r.cache_read_tokens),
            model,
            records,
        }
    }

    pub fn api_calls(&self) -> usize {
        self.records.len()
    }

    pub fn context_timeline(&self) -> Vec<ContextPoint> {
        self.records
            .iter()
            .map(|r| ContextPoint {
                ts: r.timestamp.clone(),
                tokens: r.context_tokens(),
            })
            .collect()
    }
}

fn saturating_total(records: &[UsageRecord], field: impl Fn(&UsageRecord) -> u64) -> u64 {
    records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(field(r)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(input: u64, cache_read: u64) -> UsageRecord {
        UsageRecord {
            timestamp: String::new(),
            model: String::new(),
            input_tokens: input,
            output_tokens: 1,
            cache_creation_tokens: 0,
            cache_read_tokens: cache_read,
        }
    }

    #[test]
    fn test_corrupt_counts_saturate() {
        let summary = UsageSummary::from_records(vec![record(u64::MAX, 5), record(10, u64::MAX)]);
        assert_eq!(summary.input_tokens, u64::MAX);
        assert_eq!(summary.cache_read_tokens, u64::MAX);
        assert_eq!(summary.output_tokens, 2);

        let timeline = summary.context_timeline();
        assert_eq!(timeline[0].tokens, u64::MAX);
        assert_eq!(timeline[1].tokens, u64::MAX);
    }
}
