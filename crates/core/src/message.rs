//! Conversation turns and their wire shape.
//!
//! A run's conversation is an ordered, append-only log of [`Turn`]s that is
//! replayed to the LLM on every round. The first turn is always the user's
//! prompt; every tool request is followed by exactly one tool result carrying
//! the same `call_id` before the next replay. The loop enforces that pairing;
//! this type only stores.

use serde::{Deserialize, Serialize};

/// Outcome of one tool invocation as the LLM will see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum ToolOutcome {
    Ok(String),
    Err(String),
}

impl ToolOutcome {
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Ok(text) | Self::Err(text) => text,
        }
    }

    /// The JSON envelope fed back to the LLM: `{"result": ..}` or `{"error": ..}`.
    pub fn envelope(&self) -> String {
        let value = match self {
            Self::Ok(text) => serde_json::json!({ "result": text }),
            Self::Err(text) => serde_json::json!({ "error": text }),
        };
        value.to_string()
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// The original prompt.
    User { content: String },

    /// The LLM asked for a tool. `call_id` is opaque and echoed back unchanged.
    ToolRequest {
        call_id: String,
        tool_name: String,
        tool_input: serde_json::Value,
    },

    /// The answer to the request with the same `call_id`.
    ToolResult { call_id: String, outcome: ToolOutcome },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn tool_request(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
    ) -> Self {
        Self::ToolRequest {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            tool_input,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            outcome,
        }
    }

    /// The call id for tool turns; `None` for the user turn.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::User { .. } => None,
            Self::ToolRequest { call_id, .. } | Self::ToolResult { call_id, .. } => Some(call_id),
        }
    }

    /// Map this turn onto the Messages API role/content shape.
    pub fn to_wire(&self) -> WireMessage {
        match self {
            Self::User { content } => WireMessage {
                role: Role::User,
                content: WireContent::Text(content.clone()),
            },
            Self::ToolRequest {
                call_id,
                tool_name,
                tool_input,
            } => WireMessage {
                role: Role::Assistant,
                content: WireContent::Blocks(vec![WireBlock::ToolUse {
                    id: call_id.clone(),
                    name: tool_name.clone(),
                    input: tool_input.clone(),
                }]),
            },
            Self::ToolResult { call_id, outcome } => WireMessage {
                role: Role::User,
                content: WireContent::Blocks(vec![WireBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: outcome.envelope(),
                }]),
            },
        }
    }
}

/// The role of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the exact shape the LLM service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: WireContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Blocks(Vec<WireBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireBlock {
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// The turn log of a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation from the user's prompt.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(prompt)],
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full turn log as the `messages` payload of an LLM call.
    pub fn snapshot(&self) -> Vec<WireMessage> {
        self.turns.iter().map(Turn::to_wire).collect()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The original prompt, if the conversation has been seeded.
    pub fn prompt(&self) -> Option<&str> {
        match self.turns.first() {
            Some(Turn::User { content }) => Some(content),
            _ => None,
        }
    }
}
