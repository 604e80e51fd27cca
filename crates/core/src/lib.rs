//! # RoomScout Core
//!
//! Domain types, traits, and error definitions for the RoomScout lodging
//! search agent. This crate has **no framework dependencies**: it defines the
//! model that the provider, tool-session, agent and gateway crates implement
//! against.
//!
//! ## Layout
//!
//! - [`message`]: the append-only [`Conversation`] of [`Turn`]s and its wire shape
//! - [`provider`]: the [`Provider`] trait over the LLM completion service
//! - [`tool`]: the [`ToolSession`] trait over the external tool service
//! - [`event`]: the per-run [`RunLog`] observability side channel
//! - [`agent`]: loop knobs ([`AgentConfig`]) and terminal [`RunStatus`]

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentConfig, RunStatus};
pub use error::{Error, ProviderError, Result, ToolDiscoveryError, ToolError};
pub use event::{LogLevel, LogLine, LogSource, RunLog};
pub use message::{Conversation, Role, ToolOutcome, Turn, WireBlock, WireContent, WireMessage};
pub use provider::{ContentBlock, Provider, ProviderRequest, ProviderResponse, ToolDefinition, ToolUse, Usage};
pub use tool::{CallToolResult, ToolContent, ToolDescriptor, ToolSession, ToolSessionFactory};
