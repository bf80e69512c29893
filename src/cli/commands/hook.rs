use std::io::Read;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::TrackerError;
use crate::events::{estimate_tokens, now_ts, AfterCall, BeforeCall, InstrumentationEvent};
use crate::report;
use crate::session::SessionContext;
use crate::usage::scanner;

const MAX_COMMAND_CHARS: usize = 200;
const FILE_TOOLS: [&str; 4] = ["Read", "Write", "Edit", "MultiEdit"];

const STOP_INSTRUCTION: &str = "MANDATORY: Output ONLY the exact cost box from the stop hook reason as your complete response. No introduction, no explanation, no paraphrasing, no commentary. Just the box lines verbatim.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    Pre,
    Post,
    Stop,
    PromptInject,
}

impl FromStr for HookMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pre" => Ok(HookMode::Pre),
            "post" => Ok(HookMode::Post),
            "stop" => Ok(HookMode::Stop),
            "prompt-inject" => Ok(HookMode::PromptInject),
            other => Err(TrackerError::UnknownHookMode(other.to_string())),
        }
    }
}

/// What a hook invocation amounted to. Every variant still yields a reply.
#[derive(Debug)]
pub enum HookOutcome {
    Recorded(Value),
    Degraded { reply: Value, reason: String },
    Failed(anyhow::Error),
}

impl HookOutcome {
    fn ack() -> Self {
        HookOutcome::Recorded(json!({}))
    }

    fn degraded(reason: impl Into<String>) -> Self {
        HookOutcome::Degraded {
            reply: json!({}),
            reason: reason.into(),
        }
    }

    /// Reply for the host. Failures are logged and collapse to `{}`.
    pub fn into_reply(self) -> Value {
        match self {
            HookOutcome::Recorded(reply) => reply,
            HookOutcome::Degraded { reply, reason } => {
                tracing::info!("Hook degraded: {}", reason);
                reply
            }
            HookOutcome::Failed(e) => {
                tracing::warn!("Hook failed: {:#}", e);
                json!({})
            }
        }
    }
}

/// Payload the host sends on stdin. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct HookPayload {
    #[serde(default = "unknown_session")]
    session_id: String,
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_input: Value,
    #[serde(default)]
    tool_response: Value,
}

fn unknown_session() -> String {
    "unknown".to_string()
}

fn parse_payload(raw: &str) -> Option<HookPayload> {
    match serde_json::from_str::<HookPayload>(raw) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::debug!("Unparsable hook payload: {}", e);
            None
        }
    }
}

/// Run a hook: read stdin, act, print one JSON reply. Never fails.
pub async fn run(mode: &str, config: Config) -> Result<()> {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!("Failed to read hook input: {}", e);
    }

    let outcome = match HookMode::from_str(mode) {
        Ok(mode) => handle(mode, &raw, &SessionContext::new(config)),
        Err(e) => HookOutcome::Failed(e.into()),
    };
    println!("{}", outcome.into_reply());
    Ok(())
}

pub fn handle(mode: HookMode, raw: &str, ctx: &SessionContext) -> HookOutcome {
    match mode {
        HookMode::Pre => pre(raw, ctx),
        HookMode::Post => post(raw, ctx),
        HookMode::Stop => stop(raw, ctx),
        HookMode::PromptInject => prompt_inject(ctx),
    }
}

fn pre(raw: &str, ctx: &SessionContext) -> HookOutcome {
    let Some(payload) = parse_payload(raw) else {
        return HookOutcome::degraded("pre payload was not JSON");
    };

    let input_text = serde_json::to_string(&payload.tool_input).unwrap_or_default();
    let file_path = if FILE_TOOLS.contains(&payload.tool_name.as_str()) {
        ["file_path", "path", "filename"]
            .iter()
            .find_map(|key| payload.tool_input.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    } else {
        None
    };
    let command = if payload.tool_name == "Bash" {
        payload
            .tool_input
            .get("command")
            .and_then(|v| v.as_str())
            .map(|c| c.chars().take(MAX_COMMAND_CHARS).collect())
    } else {
        None
    };

    let event = InstrumentationEvent::Before(BeforeCall {
        ts: now_ts(),
        tool: payload.tool_name,
        session_id: payload.session_id,
        input_tokens: estimate_tokens(&input_text),
        file_path,
        command,
    });

    if rand::random::<f64>() < ctx.config.sweep.probability {
        let retention = Duration::from_secs(ctx.config.sweep.retention_hours * 3600);
        match ctx.manager.sweep_orphans(retention, SystemTime::now()) {
            Ok(moved) if moved > 0 => {
                tracing::info!("Swept {} orphaned logs", moved)
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Orphan sweep failed: {}", e),
        }
    }

    record(ctx, &event)
}

fn post(raw: &str, ctx: &SessionContext) -> HookOutcome {
    let Some(payload) = parse_payload(raw) else {
        return HookOutcome::degraded("post payload was not JSON");
    };

    let response_text = match &payload.tool_response {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    let model = payload
        .tool_response
        .get("model")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let event = InstrumentationEvent::After(AfterCall {
        ts: now_ts(),
        tool: payload.tool_name,
        session_id: payload.session_id,
        response_tokens: estimate_tokens(&response_text),
        model,
        file_path: None,
    });

    record(ctx, &event)
}

fn record(ctx: &SessionContext, event: &InstrumentationEvent) -> HookOutcome {
    match ctx.manager.append(event) {
        Ok(()) => HookOutcome::ack(),
        Err(e) => HookOutcome::Failed(e.into()),
    }
}

fn stop(raw: &str, ctx: &SessionContext) -> HookOutcome {
    let payload = parse_payload(raw).unwrap_or_else(|| HookPayload {
        session_id: unknown_session(),
        ..Default::default()
    });
    let session_id = payload.session_id.as_str();

    let events = ctx.manager.read_events(session_id);
    let Some(analysis) = ctx.analyse_events(session_id, &events) else {
        return HookOutcome::degraded(format!("no events recorded for {}", session_id));
    };

    if let Err(e) = ctx.manager.archive(&analysis, Local::now()) {
        tracing::warn!("Failed to archive {}: {}", session_id, e);
    }

    let summary = report::short_summary(&analysis);
    if summary.is_empty() {
        return HookOutcome::ack();
    }

    if ctx.config.hooks.defer_summary {
        return match ctx.manager.save_pending_summary(&summary) {
            Ok(()) => HookOutcome::ack(),
            Err(e) => HookOutcome::Failed(e.into()),
        };
    }

    let already_shown = ctx
        .transcript_for(session_id)
        .map(|path| scanner::cost_box_already_shown(&path))
        .unwrap_or(false);
    if already_shown {
        return HookOutcome::degraded("summary already shown in transcript");
    }

    HookOutcome::Recorded(json!({
        "decision": "block",
        "reason": summary,
        "systemMessage": STOP_INSTRUCTION,
    }))
}

fn prompt_inject(ctx: &SessionContext) -> HookOutcome {
    match ctx.manager.take_pending_summary() {
        Some(summary) => HookOutcome::Recorded(json!({
            "systemMessage": format!(
                "MANDATORY: The FIRST thing you output in your response MUST be this exact cost box (verbatim, before any other text). Copy it exactly:\n\n{}\n\nAfter outputting the cost box, continue with your normal response.",
                summary
            ),
        })),
        None => HookOutcome::ack(),
    }
}
