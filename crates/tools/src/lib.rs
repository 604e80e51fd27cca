//! MCP tool-server client for RoomScout.
//!
//! Speaks newline-delimited JSON-RPC 2.0 to a Model Context Protocol server
//! running as a child process and exposes it through
//! `roomscout_core::ToolSession`.

pub mod error;
pub mod protocol;
pub mod session;
mod transport;

pub use error::McpError;
pub use protocol::ServerInfo;
pub use session::{McpSession, McpSessionFactory};
