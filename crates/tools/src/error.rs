//! MCP client errors.

use roomscout_core::error::ToolError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    #[error("failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON-RPC error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("{method} timed out after {timeout_secs}s")]
    Timeout { method: String, timeout_secs: u64 },

    #[error("connection to tool server closed")]
    Closed,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}

impl From<McpError> for ToolError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Protocol { code, message } => ToolError::Protocol { code, message },
            McpError::Timeout { method, timeout_secs } => ToolError::Timeout {
                tool_name: method,
                timeout_secs,
            },
            McpError::Closed => ToolError::SessionClosed,
            other => ToolError::Transport(other.to_string()),
        }
    }
}
