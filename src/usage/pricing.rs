use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default ceiling for the running context estimate
pub const DEFAULT_CONTEXT_CAP: u64 = 200_000;

/// Shortest dash-delimited prefix tried during prefix matching
const MIN_PREFIX_SEGMENTS: usize = 3;

const CACHE_CREATION_MULTIPLIER: f64 = 1.25;
const CACHE_READ_MULTIPLIER: f64 = 0.1;

/// Per-model prices in USD per million tokens.
///
/// Cache rates are optional in the rate-card file and derive from the
/// input rate when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub input: f64,
    pub output: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<f64>,
}

impl RateCard {
    /// Card used when a model resolves to nothing (sonnet-class pricing)
    pub fn fallback() -> Self {
        RateCard {
            input: 3.00,
            output: 15.00,
            cache_creation: Some(3.75),
            cache_read: Some(0.30),
        }
    }

    pub fn cache_creation_rate(&self) -> f64 {
        self.cache_creation
            .unwrap_or(self.input * CACHE_CREATION_MULTIPLIER)
    }

    pub fn cache_read_rate(&self) -> f64 {
        self.cache_read.unwrap_or(self.input * CACHE_READ_MULTIPLIER)
    }

    /// Cost in USD of the four token classes at this card's rates
    pub fn cost(
        &self,
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
    ) -> f64 {
        (input_tokens as f64 * self.input
            + output_tokens as f64 * self.output
            + cache_creation_tokens as f64 * self.cache_creation_rate()
            + cache_read_tokens as f64 * self.cache_read_rate())
            / 1_000_000.0
    }
}

/// How a model name was matched against the rate-card table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PriceSource {
    Exact,
    Alias(String),
    Prefix(String),
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPrice {
    pub card: RateCard,
    pub source: PriceSource,
}

/// Rate-card table as stored in `pricing.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    pub models: HashMap<String, RateCard>,
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
    #[serde(default = "default_context_cap")]
    pub context_window_cap_tokens: u64,
}

fn default_context_cap() -> u64 {
    DEFAULT_CONTEXT_CAP
}

impl Default for PricingTable {
    fn default() -> Self {
        PricingTable {
            models: HashMap::new(),
            model_aliases: HashMap::new(),
            context_window_cap_tokens: DEFAULT_CONTEXT_CAP,
        }
    }
}

impl PricingTable {
    /// Load the rate-card file at `path`, falling back to the embedded table.
    pub fn load(path: &Path) -> Self {
        match Self::load_file(path) {
            Ok(table) => table,
            Err(e) => {
                tracing::debug!(
                    "No usable pricing file at {}: {}, using embedded table",
                    path.display(),
                    e
                );
                Self::embedded()
            }
        }
    }

    fn load_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rate cards compiled into the binary
    pub fn embedded() -> Self {
        let json_data = include_str!("default_pricing.json");
        serde_json::from_str(json_data).unwrap_or_default()
    }

    /// Resolve a model name to a rate card.
    ///
    /// Precedence: exact name, alias whose target is priced, longest
    /// dash-delimited prefix of at least three segments, fallback card.
    pub fn resolve(&self, model: &str) -> ResolvedPrice {
        if let Some(card) = self.models.get(model) {
            return ResolvedPrice {
                card: card.clone(),
                source: PriceSource::Exact,
            };
        }

        if let Some(target) = self.model_aliases.get(model) {
            if let Some(card) = self.models.get(target) {
                return ResolvedPrice {
                    card: card.clone(),
                    source: PriceSource::Alias(target.clone()),
                };
            }
        }

        let parts: Vec<&str> = model.split('-').collect();
        for end in (MIN_PREFIX_SEGMENTS..=parts.len()).rev() {
            let candidate = parts[..end].join("-");
            if let Some(card) = self.models.get(&candidate) {
                return ResolvedPrice {
                    card: card.clone(),
                    source: PriceSource::Prefix(candidate),
                };
            }
        }

        tracing::warn!(
            "Model '{}' not in pricing table, using sonnet fallback",
            model
        );
        ResolvedPrice {
            card: RateCard::fallback(),
            source: PriceSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(input: f64) -> RateCard {
        RateCard {
            input,
            output: input * 5.0,
            cache_creation: None,
            cache_read: None,
        }
    }

    fn table() -> PricingTable {
        let mut models = HashMap::new();
        models.insert("claude-sonnet-4-5".to_string(), card(3.0));
        models.insert("claude-opus-4-6".to_string(), card(5.0));
        models.insert("opus".to_string(), card(99.0));
        let mut model_aliases = HashMap::new();
        model_aliases.insert("opus".to_string(), "claude-opus-4-6".to_string());
        model_aliases.insert("best".to_string(), "claude-opus-4-6".to_string());
        model_aliases.insert("ghost".to_string(), "claude-ghost-1-0".to_string());
        PricingTable {
            models,
            model_aliases,
            context_window_cap_tokens: DEFAULT_CONTEXT_CAP,
        }
    }

    #[test]
    fn test_exact_match_beats_alias() {
        let resolved = table().resolve("opus");
        assert_eq!(resolved.source, PriceSource::Exact);
        assert!((resolved.card.input - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_alias_resolution() {
        let resolved = table().resolve("best");
        assert_eq!(
            resolved.source,
            PriceSource::Alias("claude-opus-4-6".to_string())
        );
    }

    #[test]
    fn test_dated_suffix_resolves_by_prefix() {
        let resolved = table().resolve("claude-sonnet-4-5-20250929");
        assert_eq!(
            resolved.source,
            PriceSource::Prefix("claude-sonnet-4-5".to_string())
        );
        assert!((resolved.card.input - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_alias_beats_prefix() {
        let mut t = table();
        t.model_aliases
            .insert("claude-sonnet-4-5-x".to_string(), "claude-opus-4-6".to_string());
        let resolved = t.resolve("claude-sonnet-4-5-x");
        assert_eq!(
            resolved.source,
            PriceSource::Alias("claude-opus-4-6".to_string())
        );
    }

    #[test]
    fn test_dangling_alias_falls_through() {
        let resolved = table().resolve("ghost");
        assert_eq!(resolved.source, PriceSource::Fallback);
        assert_eq!(resolved.card, RateCard::fallback());
    }

    #[test]
    fn test_prefix_requires_three_segments() {
        let mut t = table();
        t.models.insert("claude-sonnet".to_string(), card(1.0));
        let resolved = t.resolve("claude-sonnet-9-9");
        assert_eq!(resolved.source, PriceSource::Fallback);
    }

    #[test]
    fn test_unknown_model_uses_fallback() {
        let resolved = table().resolve("gpt-5");
        assert_eq!(resolved.source, PriceSource::Fallback);
        assert!((resolved.card.input - 3.0).abs() < 1e-9);
        assert!((resolved.card.output - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_derived_cache_rates() {
        let c = card(4.0);
        assert!((c.cache_creation_rate() - 5.0).abs() < 1e-9);
        assert!((c.cache_read_rate() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_card_cost() {
        let c = RateCard::fallback();
        // $3 input + $15 output + $3.75 cache write + $0.30 cache read
        let cost = c.cost(1_000_000, 1_000_000, 1_000_000, 1_000_000);
        assert!((cost - 22.05).abs() < 1e-9);
        assert!(c.cost(0, 0, 0, 0).abs() < 1e-12);
    }

    #[test]
    fn test_embedded_table_has_models() {
        let embedded = PricingTable::embedded();
        assert!(!embedded.models.is_empty());
        assert_eq!(embedded.context_window_cap_tokens, DEFAULT_CONTEXT_CAP);
        assert!(matches!(
            embedded.resolve("claude-sonnet-4-5-20250929").source,
            PriceSource::Prefix(_)
        ));
        assert!(matches!(
            embedded.resolve("sonnet").source,
            PriceSource::Alias(_)
        ));
    }

    #[test]
    fn test_load_missing_file_uses_embedded() {
        let loaded = PricingTable::load(Path::new("/nonexistent/pricing.json"));
        assert!(loaded.models.contains_key("claude-sonnet-4-6"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(
            &path,
            r#"{"models": {"m-1-2": {"input": 2.0, "output": 8.0}}, "context_window_cap_tokens": 1000}"#,
        )
        .unwrap();
        let loaded = PricingTable::load(&path);
        assert_eq!(loaded.context_window_cap_tokens, 1000);
        assert!(loaded.model_aliases.is_empty());
        assert!((loaded.resolve("m-1-2").card.cache_read_rate() - 0.2).abs() < 1e-9);
    }
}
