use serde_json::Value;

use super::dto::*;
use super::handlers::{self, AppState};

/// Handle one line of input. `None` means nothing should be written back.
pub fn handle_line(state: &AppState, line: &str) -> Option<JsonRpcResponse> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Unparsable request: {}", e);
            return Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            ));
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            ))
        }
    };
    route(state, request)
}

pub fn route(state: &AppState, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    tracing::debug!("{} request", request.method);
    if request.is_notification() {
        return None;
    }
    let id = request.id.clone().unwrap_or(Value::Null);

    let result = match request.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "tools/list" => Ok(tool_descriptors()),
        "tools/call" => tool_call_params(request.params)
            .and_then(|params| handlers::call_tool(state, params)),
        other => {
            return Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ))
        }
    };

    Some(match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            tracing::warn!("{} failed: {}", request.method, e);
            JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string())
        }
    })
}

fn tool_call_params(params: Value) -> anyhow::Result<ToolCallParams> {
    if params.is_null() {
        return Ok(ToolCallParams::default());
    }
    Ok(serde_json::from_value(params)?)
}
