//! Log view filters for the run log endpoints.

use roomscout_core::event::{LogLevel, LogLine, LogSource};
use serde::{Deserialize, Serialize};

/// Which run-log lines a client wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFilter {
    /// Everything except HTTP access lines.
    #[default]
    All,
    Llm,
    /// Tool server traffic and per-listing summaries.
    Mcp,
    Integration,
    /// Error level only, from any source.
    Error,
}

impl LogFilter {
    /// Parse a `?filter=` value. Unknown or missing values mean `All`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("llm") => Self::Llm,
            Some("mcp") => Self::Mcp,
            Some("integration") => Self::Integration,
            Some("error") => Self::Error,
            _ => Self::All,
        }
    }

    pub fn accepts(self, line: &LogLine) -> bool {
        if is_listing_summary(&line.message) {
            return matches!(self, Self::All | Self::Mcp);
        }
        match self {
            Self::All => line.source != LogSource::Http,
            Self::Llm => line.source == LogSource::Llm,
            Self::Mcp => line.source == LogSource::Mcp,
            Self::Integration => line.source == LogSource::Integration,
            Self::Error => line.level == LogLevel::Error,
        }
    }
}

fn is_listing_summary(message: &str) -> bool {
    message.contains("FORMATTED LISTING") || message.contains("====================")
}
