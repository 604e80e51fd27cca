//! Error types for the RoomScout domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all RoomScout operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Discovery(#[from] ToolDiscoveryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Faults raised by the LLM completion service. The agent loop treats every
/// variant as a transport fault: it backs off, retries once, then gives up.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Faults raised by a tool session while talking to the tool service.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("{0}")]
    Transport(String),

    #[error("server returned error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("tool session is closed")]
    SessionClosed,

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// The tool service could not enumerate its tools. Fatal to a run.
#[derive(Debug, Clone, Error)]
#[error("Tool discovery failed: {source}")]
pub struct ToolDiscoveryError {
    #[from]
    pub source: ToolError,
}
