use serde::{Deserialize, Serialize};

/// Upper bound on any single size estimate
pub const MAX_ESTIMATED_TOKENS: u64 = 50_000;

/// One line of a per-session event log.
///
/// Written by the `pre`/`post` hooks; never rewritten once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstrumentationEvent {
    #[serde(rename = "pre", alias = "before")]
    Before(BeforeCall),
    #[serde(rename = "post", alias = "after")]
    After(AfterCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BeforeCall {
    #[serde(default)]
    pub ts: f64,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AfterCall {
    #[serde(default)]
    pub ts: f64,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub response_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl InstrumentationEvent {
    pub fn ts(&self) -> f64 {
        match self {
            InstrumentationEvent::Before(b) => b.ts,
            InstrumentationEvent::After(a) => a.ts,
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            InstrumentationEvent::Before(b) => &b.tool,
            InstrumentationEvent::After(a) => &a.tool,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            InstrumentationEvent::Before(b) => &b.session_id,
            InstrumentationEvent::After(a) => &a.session_id,
        }
    }

    /// Model name reported by an `after` event, if any
    pub fn model(&self) -> Option<&str> {
        match self {
            InstrumentationEvent::After(a) => a.model.as_deref().filter(|m| !m.is_empty()),
            InstrumentationEvent::Before(_) => None,
        }
    }
}

/// Rough token count for a piece of text: four characters per token, capped.
pub fn estimate_tokens(text: &str) -> u64 {
    let tokens = (text.chars().count() / 4) as u64;
    tokens.min(MAX_ESTIMATED_TOKENS)
}

/// Seconds since the Unix epoch as a float, matching the log's `ts` field
pub fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pre_line() {
        let line = r#"{"type":"pre","ts":12.5,"tool":"Read","session_id":"s1","input_tokens":40,"file_path":"/a.rs"}"#;
        let event: InstrumentationEvent = serde_json::from_str(line).unwrap();
        match event {
            InstrumentationEvent::Before(b) => {
                assert_eq!(b.tool, "Read");
                assert_eq!(b.input_tokens, 40);
                assert_eq!(b.file_path.as_deref(), Some("/a.rs"));
                assert!(b.command.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_post_line_with_missing_fields() {
        let line = r#"{"type":"post","tool":"Bash"}"#;
        let event: InstrumentationEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.tool(), "Bash");
        assert_eq!(event.ts(), 0.0);
        assert!(event.model().is_none());
    }

    #[test]
    fn test_before_alias_accepted() {
        let line = r#"{"type":"before","ts":1.0,"tool":"Grep"}"#;
        let event: InstrumentationEvent = serde_json::from_str(line).unwrap();
        assert!(matches!(event, InstrumentationEvent::Before(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<InstrumentationEvent>(r#"{"type":"stop"}"#).is_err());
    }

    #[test]
    fn test_serialized_tag() {
        let event = InstrumentationEvent::After(AfterCall {
            ts: 2.0,
            tool: "Read".to_string(),
            response_tokens: 50,
            ..Default::default()
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"post""#));
        assert!(!json.contains("model"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(1_000_000)), MAX_ESTIMATED_TOKENS);
    }
}
