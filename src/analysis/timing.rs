use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::events::{AfterCall, BeforeCall, InstrumentationEvent};

/// Tool names carrying this prefix come from MCP integrations
const MCP_PREFIX: &str = "mcp__";

/// What a tool call was spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Reading files")]
    ReadingFiles,
    #[serde(rename = "Writing files")]
    WritingFiles,
    #[serde(rename = "Editing files")]
    EditingFiles,
    #[serde(rename = "Running commands")]
    RunningCommands,
    #[serde(rename = "Delegating to sub-task")]
    Delegating,
    #[serde(rename = "Searching code")]
    SearchingCode,
    #[serde(rename = "Browsing web")]
    BrowsingWeb,
    #[serde(rename = "MCP tool call")]
    McpToolCall,
    Other,
}

const TOOL_CATEGORIES: &[(&str, Category)] = &[
    ("Read", Category::ReadingFiles),
    ("Write", Category::WritingFiles),
    ("Edit", Category::EditingFiles),
    ("MultiEdit", Category::EditingFiles),
    ("Bash", Category::RunningCommands),
    ("Task", Category::Delegating),
    ("Grep", Category::SearchingCode),
    ("Glob", Category::SearchingCode),
    ("WebFetch", Category::BrowsingWeb),
    ("WebSearch", Category::BrowsingWeb),
];

impl Category {
    pub fn for_tool(tool: &str) -> Self {
        if tool.starts_with(MCP_PREFIX) {
            return Category::McpToolCall;
        }
        TOOL_CATEGORIES
            .iter()
            .find(|(name, _)| *name == tool)
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::ReadingFiles => "Reading files",
            Category::WritingFiles => "Writing files",
            Category::EditingFiles => "Editing files",
            Category::RunningCommands => "Running commands",
            Category::Delegating => "Delegating to sub-task",
            Category::SearchingCode => "Searching code",
            Category::BrowsingWeb => "Browsing web",
            Category::McpToolCall => "MCP tool call",
            Category::Other => "Other",
        }
    }
}

/// One tool call with its `before` and (possibly missing) `after` merged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedInvocation {
    pub tool: String,
    pub category: Category,
    /// Timestamp of the `before` event
    pub ts: f64,
    pub elapsed_s: f64,
    pub input_tokens: u64,
    pub response_tokens: u64,
    pub file_path: Option<String>,
    pub command: Option<String>,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciled {
    pub invocations: Vec<PairedInvocation>,
    pub time_by_category: BTreeMap<Category, f64>,
}

/// Pair `before` events with `after` events of the same tool.
///
/// `before` events are taken in log order. Each one claims the earliest
/// unclaimed `after` of the same tool with a strictly later timestamp, so no
/// event is ever used twice. Interleaved calls of one tool can still be
/// misattributed; nothing in the log identifies individual calls.
pub fn reconcile(events: &[InstrumentationEvent]) -> Reconciled {
    let mut pool: HashMap<&str, Vec<&AfterCall>> = HashMap::new();
    let mut befores: Vec<&BeforeCall> = Vec::new();

    for event in events {
        match event {
            InstrumentationEvent::Before(b) => befores.push(b),
            InstrumentationEvent::After(a) => pool.entry(a.tool.as_str()).or_default().push(a),
        }
    }

    let mut invocations = Vec::with_capacity(befores.len());
    let mut time_by_category: BTreeMap<Category, f64> = BTreeMap::new();

    for before in befores {
        let matched = pool
            .get_mut(before.tool.as_str())
            .and_then(|candidates| take_earliest_after(candidates, before.ts));

        let category = Category::for_tool(&before.tool);
        let (elapsed_s, response_tokens, after_path) = match matched {
            Some(after) => (
                after.ts - before.ts,
                after.response_tokens,
                after.file_path.clone(),
            ),
            None => (0.0, 0, None),
        };

        *time_by_category.entry(category).or_insert(0.0) += elapsed_s;

        invocations.push(PairedInvocation {
            tool: before.tool.clone(),
            category,
            ts: before.ts,
            elapsed_s,
            input_tokens: before.input_tokens,
            response_tokens,
            file_path: before.file_path.clone().or(after_path),
            command: before.command.clone(),
            matched: matched.is_some(),
        });
    }

    Reconciled {
        invocations,
        time_by_category,
    }
}

/// Remove and return the earliest candidate later than `ts`; ties keep log order.
fn take_earliest_after<'a>(candidates: &mut Vec<&'a AfterCall>, ts: f64) -> Option<&'a AfterCall> {
    let index = candidates
        .iter()
        .enumerate()
        .filter(|(_, a)| a.ts > ts)
        .min_by(|(ia, a), (ib, b)| a.ts.total_cmp(&b.ts).then(ia.cmp(ib)))
        .map(|(i, _)| i)?;
    Some(candidates.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn before(tool: &str, ts: f64, input: u64) -> InstrumentationEvent {
        InstrumentationEvent::Before(BeforeCall {
            ts,
            tool: tool.to_string(),
            session_id: "s".to_string(),
            input_tokens: input,
            ..Default::default()
        })
    }

    fn after(tool: &str, ts: f64, output: u64) -> InstrumentationEvent {
        InstrumentationEvent::After(AfterCall {
            ts,
            tool: tool.to_string(),
            session_id: "s".to_string(),
            response_tokens: output,
            ..Default::default()
        })
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(Category::for_tool("Read"), Category::ReadingFiles);
        assert_eq!(Category::for_tool("MultiEdit"), Category::EditingFiles);
        assert_eq!(Category::for_tool("Glob"), Category::SearchingCode);
        assert_eq!(
            Category::for_tool("mcp__github__create_issue"),
            Category::McpToolCall
        );
        assert_eq!(Category::for_tool("TodoWrite"), Category::Other);
        assert_eq!(Category::McpToolCall.label(), "MCP tool call");
    }

    #[test]
    fn test_single_read_pair() {
        let result = reconcile(&[before("Read", 0.0, 100), after("Read", 2.0, 50)]);
        assert_eq!(result.invocations.len(), 1);
        let inv = &result.invocations[0];
        assert!(inv.matched);
        assert!((inv.elapsed_s - 2.0).abs() < 1e-9);
        assert_eq!(inv.input_tokens, 100);
        assert_eq!(inv.response_tokens, 50);
        assert_eq!(inv.category, Category::ReadingFiles);
        assert!((result.time_by_category[&Category::ReadingFiles] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_unmatched_before_has_zero_elapsed() {
        let result = reconcile(&[before("Bash", 5.0, 10), after("Bash", 4.0, 99)]);
        let inv = &result.invocations[0];
        assert!(!inv.matched);
        assert_eq!(inv.elapsed_s, 0.0);
        assert_eq!(inv.response_tokens, 0);
    }

    #[test]
    fn test_after_never_reused() {
        let result = reconcile(&[
            before("Read", 1.0, 0),
            before("Read", 2.0, 0),
            after("Read", 3.0, 7),
        ]);
        let matched: Vec<bool> = result.invocations.iter().map(|i| i.matched).collect();
        assert_eq!(matched, vec![true, false]);
    }

    #[test]
    fn test_overlapping_calls_pick_earliest_later_after() {
        let result = reconcile(&[
            before("Grep", 1.0, 0),
            before("Grep", 2.0, 0),
            after("Grep", 6.0, 60),
            after("Grep", 4.0, 40),
        ]);
        assert_eq!(result.invocations[0].response_tokens, 40);
        assert!((result.invocations[0].elapsed_s - 3.0).abs() < 1e-9);
        assert_eq!(result.invocations[1].response_tokens, 60);
        assert!((result.invocations[1].elapsed_s - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_tools_do_not_cross_match() {
        let result = reconcile(&[before("Read", 1.0, 0), after("Write", 2.0, 5)]);
        assert!(!result.invocations[0].matched);
    }

    #[test]
    fn test_every_event_used_at_most_once() {
        let events = vec![
            before("Read", 0.0, 1),
            after("Read", 1.0, 1),
            before("Read", 0.5, 1),
            after("Read", 1.5, 1),
            before("Read", 2.0, 1),
            before("Edit", 0.1, 1),
            after("Edit", 0.2, 1),
            after("Edit", 0.3, 1),
        ];
        let result = reconcile(&events);
        let befores = events
            .iter()
            .filter(|e| matches!(e, InstrumentationEvent::Before(_)))
            .count();
        let afters = events.len() - befores;
        let matched = result.invocations.iter().filter(|i| i.matched).count();
        assert_eq!(result.invocations.len(), befores);
        assert!(matched <= afters);
        assert_eq!(matched, 3);
        assert!(result.invocations.iter().all(|i| i.elapsed_s >= 0.0));
    }

    #[test]
    fn test_file_path_falls_back_to_after() {
        let mut post = AfterCall {
            ts: 2.0,
            tool: "Read".to_string(),
            ..Default::default()
        };
        post.file_path = Some("/tmp/x".to_string());
        let result = reconcile(&[before("Read", 1.0, 0), InstrumentationEvent::After(post)]);
        assert_eq!(result.invocations[0].file_path.as_deref(), Some("/tmp/x"));
    }
}
