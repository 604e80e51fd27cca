//! Agent loop knobs and terminal status.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one agent loop run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM model identifier
    pub model: String,

    /// System prompt; may be empty
    pub system_prompt: String,

    pub temperature: f32,

    /// Maximum output tokens per LLM call
    pub max_tokens: u32,

    /// Maximum tool dispatches per run
    pub max_tool_calls: u32,

    /// Pause after the second and later tool dispatches, before the next LLM call
    pub inter_call_delay: Duration,

    /// Pause before every follow-up LLM call
    pub llm_call_delay: Duration,

    /// Pause before the single retry of a failed LLM call
    pub retry_backoff: Duration,

    /// Wall-clock deadline for the whole run
    pub run_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-7-sonnet-20250219".into(),
            system_prompt: String::new(),
            temperature: 0.2,
            max_tokens: 4096,
            max_tool_calls: 5,
            inter_call_delay: Duration::from_secs(3),
            llm_call_delay: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(5),
            run_timeout: None,
        }
    }
}

impl AgentConfig {
    /// A config with every pause set to zero.
    pub fn without_delays(mut self) -> Self {
        self.inter_call_delay = Duration::ZERO;
        self.llm_call_delay = Duration::ZERO;
        self.retry_backoff = Duration::ZERO;
        self
    }
}

/// How a run ended. Travels alongside the final text so an empty answer can
/// be told apart from a failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The LLM stopped requesting tools.
    Completed,
    /// The tool budget ran out; text is whatever accompanied the last response.
    BudgetExhausted,
    /// An LLM call failed twice in a row.
    LlmUnavailable,
    Cancelled,
    TimedOut,
}

impl RunStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed | Self::BudgetExhausted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::BudgetExhausted => "budget_exhausted",
            Self::LlmUnavailable => "llm_unavailable",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}
