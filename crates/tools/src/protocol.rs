//! JSON-RPC 2.0 and MCP message types.

use roomscout_core::tool::{CallToolResult, ToolContent, ToolDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const CLIENT_NAME: &str = "roomscout";

// --- JSON-RPC types ---

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Anything the server writes on stdout. Responses carry `id` plus
/// `result` or `error`; notifications carry `method` and no `id`.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcIncoming {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

// --- MCP types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolsListResult {
    pub tools: Vec<McpToolDef>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCallToolResult {
    #[serde(default)]
    pub content: Vec<McpContent>,
    #[serde(default)]
    pub is_error: bool,
}

/// Server identity reported by `initialize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpInitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: ServerInfo,
}

pub(crate) fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// MCP servers expect arguments to be an object, never null.
pub(crate) fn call_params(name: &str, arguments: Value) -> Value {
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };
    serde_json::json!({
        "name": name,
        "arguments": arguments,
    })
}

impl From<McpToolDef> for ToolDescriptor {
    fn from(tool: McpToolDef) -> Self {
        ToolDescriptor {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool
                .input_schema
                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
        }
    }
}

impl From<McpCallToolResult> for CallToolResult {
    fn from(result: McpCallToolResult) -> Self {
        CallToolResult {
            is_error: result.is_error,
            content: result
                .content
                .into_iter()
                .map(|c| ToolContent {
                    text: if c.content_type == "text" { c.text } else { None },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialization_omits_null_params() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "tools/list",
            params: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/list");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn call_params_replaces_null_arguments() {
        let params = call_params("airbnb_search", Value::Null);
        assert_eq!(params, json!({"name": "airbnb_search", "arguments": {}}));
    }

    #[test]
    fn initialize_advertises_protocol_version() {
        let params = initialize_params();
        assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(params["clientInfo"]["name"], CLIENT_NAME);
    }

    #[test]
    fn tool_def_converts_with_defaults() {
        let def: McpToolDef = serde_json::from_value(json!({"name": "airbnb_search"})).unwrap();
        let desc = ToolDescriptor::from(def);
        assert_eq!(desc.description, "");
        assert_eq!(desc.input_schema, json!({"type": "object"}));
    }

    #[test]
    fn call_result_keeps_only_text_content() {
        let raw: McpCallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"},
                {"type": "text", "text": "{\"searchResults\": []}"}
            ],
            "isError": false
        }))
        .unwrap();
        let result = CallToolResult::from(raw);
        assert_eq!(result.content.len(), 2);
        assert_eq!(result.first_text(), "");
        assert_eq!(result.content[1].text.as_deref(), Some("{\"searchResults\": []}"));
    }

    #[test]
    fn incoming_distinguishes_response_and_notification() {
        let resp: JsonRpcIncoming =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"Method not found"}}"#)
                .unwrap();
        assert_eq!(resp.id, Some(json!(3)));
        assert_eq!(resp.error.unwrap().code, -32601);

        let note: JsonRpcIncoming =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#).unwrap();
        assert!(note.id.is_none());
        assert_eq!(note.method.as_deref(), Some("notifications/message"));
    }
}
