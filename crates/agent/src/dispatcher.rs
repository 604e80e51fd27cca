//! Tool dispatch: one call against the tool service, always answered.

use roomscout_core::event::{LogSource, RunLog};
use roomscout_core::message::{ToolOutcome, Turn};
use roomscout_core::tool::ToolSession;

const PREVIEW_CHARS: usize = 100;

/// Invoke `tool_name` and turn whatever happens into a tool-result turn.
///
/// Never fails: a tool-level error becomes `Err(text)` and a transport fault
/// becomes `Err("Error making tool call: ..")`, so the LLM sees the failure
/// on its next round.
pub async fn dispatch(
    tool_name: &str,
    tool_input: &serde_json::Value,
    call_id: &str,
    session: &dyn ToolSession,
    log: &RunLog,
) -> Turn {
    log.info(LogSource::Mcp, format!("Calling tool: {tool_name}"));
    log.debug(
        LogSource::Mcp,
        format!("Tool input: {}", preview(&tool_input.to_string())),
    );

    let outcome = match session.call_tool(tool_name, tool_input.clone()).await {
        Ok(result) if result.is_error => {
            let text = result.first_text().to_string();
            log.error(LogSource::Mcp, format!("Tool call failed: {}", preview(&text)));
            ToolOutcome::Err(text)
        }
        Ok(result) => {
            let text = result.first_text().to_string();
            log.info(LogSource::Mcp, format!("Tool call successful: {tool_name}"));
            inspect_payload(&text, log);
            log.debug(LogSource::Mcp, format!("Tool response snippet: {}", preview(&text)));
            ToolOutcome::Ok(text)
        }
        Err(e) => {
            let message = format!("Error making tool call: {e}");
            log.error(LogSource::Mcp, message.clone());
            ToolOutcome::Err(message)
        }
    };

    Turn::tool_result(call_id, outcome)
}

/// Best-effort look inside a JSON payload for the log. Never affects the result.
fn inspect_payload(text: &str, log: &RunLog) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            if let Some(results) = value.get("searchResults").and_then(|v| v.as_array()) {
                log.info(LogSource::Mcp, format!("Found {} search results", results.len()));
                for (idx, listing) in results.iter().enumerate() {
                    let name = listing
                        .pointer("/listing/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Unknown property");
                    log.debug(LogSource::Mcp, format!("FORMATTED LISTING #{}: {name}", idx + 1));
                }
            }
        }
        Err(e) => {
            log.debug(LogSource::Mcp, format!("Could not parse tool result as JSON: {e}"));
        }
    }
}

/// First `PREVIEW_CHARS` characters, with an ellipsis when cut.
pub(crate) fn preview(s: &str) -> String {
    match s.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
