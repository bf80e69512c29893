use anyhow::Result;
use chrono::Local;
use serde_json::Value;

use crate::archive::history;
use crate::session::SessionContext;

use super::dto::*;

/// Shared server state, loaded once at startup
pub struct AppState {
    pub context: SessionContext,
}

/// Report on one session, or the latest active one
pub fn get_session_report(state: &AppState, args: Value) -> Result<Value> {
    let args: SessionReportArgs = parse_args(args)?;
    let text = state.context.report_text(args.session_id.as_deref());
    Ok(text_content(text))
}

/// Totals over archived sessions
pub fn get_history(state: &AppState, args: Value) -> Result<Value> {
    let args: HistoryArgs = parse_args(args)?;
    let records = state.context.manager.read_history();
    Ok(text_content(history::history_report(
        &records,
        args.days,
        Local::now(),
    )))
}

pub fn get_suggestions(state: &AppState, _args: Value) -> Result<Value> {
    let records = state.context.manager.read_history();
    Ok(text_content(history::suggestions_report(&records)))
}

/// Dispatch a `tools/call`. Unknown tools answer with text, not an error.
pub fn call_tool(state: &AppState, params: ToolCallParams) -> Result<Value> {
    match params.name.as_str() {
        "get_session_report" => get_session_report(state, params.arguments),
        "get_history" => get_history(state, params.arguments),
        "get_suggestions" => get_suggestions(state, params.arguments),
        other => Ok(text_content(format!("Unknown tool: {}", other))),
    }
}

fn parse_args<T: serde::de::DeserializeOwned + Default>(args: Value) -> Result<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(args)?)
}
