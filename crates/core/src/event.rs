//! Run log: the per-run observability side channel.
//!
//! Every run owns one [`RunLog`]. The loop appends human-readable lines to
//! it (tool calls, tool results, rate-limit waits, errors) and any number of
//! subscribers can read the backlog or follow new lines live. Lines are also
//! mirrored to `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Which part of the system produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// Loop control flow
    Agent,
    /// LLM requests and responses
    Llm,
    /// Tool service traffic
    Mcp,
    /// Handoff between the loop and its callers
    Integration,
    /// Web layer
    Http,
}

/// A single line in a run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
}

/// Append-only log of one run with a broadcast for live subscribers.
pub struct RunLog {
    run_id: String,
    lines: Mutex<Vec<LogLine>>,
    sender: broadcast::Sender<Arc<LogLine>>,
}

impl RunLog {
    /// Create a new log with the given live-subscriber capacity.
    pub fn new(run_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            run_id: run_id.into(),
            lines: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append a line, mirror it to tracing and notify subscribers.
    pub fn push(&self, level: LogLevel, source: LogSource, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(run_id = %self.run_id, ?source, "{message}"),
            LogLevel::Info => tracing::info!(run_id = %self.run_id, ?source, "{message}"),
            LogLevel::Warn => tracing::warn!(run_id = %self.run_id, ?source, "{message}"),
            LogLevel::Error => tracing::error!(run_id = %self.run_id, ?source, "{message}"),
        }

        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let line = LogLine {
            seq: lines.len() as u64,
            timestamp: Utc::now(),
            level,
            source,
            message,
        };
        lines.push(line.clone());
        // Sent under the lock so a backlog snapshot and its subscription never race.
        let _ = self.sender.send(Arc::new(line));
    }

    pub fn debug(&self, source: LogSource, message: impl Into<String>) {
        self.push(LogLevel::Debug, source, message);
    }

    pub fn info(&self, source: LogSource, message: impl Into<String>) {
        self.push(LogLevel::Info, source, message);
    }

    pub fn warn(&self, source: LogSource, message: impl Into<String>) {
        self.push(LogLevel::Warn, source, message);
    }

    pub fn error(&self, source: LogSource, message: impl Into<String>) {
        self.push(LogLevel::Error, source, message);
    }

    /// A copy of every line so far.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to new lines only.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LogLine>> {
        self.sender.subscribe()
    }

    /// The current backlog plus a receiver for every line after it.
    pub fn follow(&self) -> (Vec<LogLine>, broadcast::Receiver<Arc<LogLine>>) {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        (lines.clone(), self.sender.subscribe())
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("run_id", &self.run_id)
            .field("lines", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_and_subscribe() {
        let log = RunLog::new("run-1", 16);
        let mut rx = log.subscribe();

        log.info(LogSource::Mcp, "Calling tool: airbnb_search");

        let line = rx.recv().await.unwrap();
        assert_eq!(line.seq, 0);
        assert_eq!(line.source, LogSource::Mcp);
        assert_eq!(line.message, "Calling tool: airbnb_search");
    }

    #[test]
    fn no_subscribers_doesnt_panic() {
        let log = RunLog::new("run-1", 16);
        log.error(LogSource::Llm, "nobody listening");
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn follow_splits_backlog_and_live() {
        let log = RunLog::new("run-2", 16);
        log.info(LogSource::Agent, "first");
        log.info(LogSource::Agent, "second");

        let (backlog, mut rx) = log.follow();
        log.warn(LogSource::Agent, "third");

        assert_eq!(backlog.len(), 2);
        let live = rx.recv().await.unwrap();
        assert_eq!(live.seq, 2);
        assert_eq!(live.level, LogLevel::Warn);
    }

    #[test]
    fn level_serializes_uppercase() {
        let json = serde_json::to_string(&LogLevel::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
    }
}
