//! Background runs and the registry that tracks them.
//!
//! Each `POST /search` creates a [`RunEntry`] with its own [`RunLog`] and
//! spawns the agent on a Tokio task. HTTP handlers only ever read entries.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use roomscout_agent::{AgentLoop, RunOutcome, run_agent};
use roomscout_core::event::{LogSource, RunLog};
use roomscout_core::tool::ToolSessionFactory;

/// Maximum number of runs kept before the oldest finished ones are evicted.
const MAX_RUNS: usize = 256;
/// Live-subscriber buffer per run log.
const LOG_CAPACITY: usize = 1_024;

/// Where a run currently stands.
#[derive(Debug, Clone)]
pub enum RunPhase {
    Searching,
    Finished(RunOutcome),
    /// The run never reached the LLM (tool discovery failed).
    Failed(String),
}

impl RunPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Searching)
    }
}

/// One submitted search.
pub struct RunEntry {
    pub id: String,
    pub prompt: String,
    pub started_at: DateTime<Utc>,
    pub log: Arc<RunLog>,
    pub cancel: CancellationToken,
    phase: watch::Sender<RunPhase>,
}

impl RunEntry {
    fn new(prompt: &str) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            log: Arc::new(RunLog::new(id.clone(), LOG_CAPACITY)),
            id,
            prompt: prompt.to_string(),
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            phase: watch::Sender::new(RunPhase::Searching),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.phase.borrow().is_active()
    }

    /// Current phase now, then every change.
    pub fn watch_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn finish(&self, phase: RunPhase) {
        self.phase.send_replace(phase);
    }
}

/// Returned when single-flight is on and a run is still searching.
#[derive(Debug, thiserror::Error)]
#[error("A search is already running ({active_id})")]
pub struct RegistryBusy {
    pub active_id: String,
}

/// All runs of this process, keyed by run id.
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Arc<RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run. With `single_flight`, refuses while another run is active.
    pub async fn begin(&self, prompt: &str, single_flight: bool) -> Result<Arc<RunEntry>, RegistryBusy> {
        let mut runs = self.runs.write().await;

        if single_flight && let Some(active) = runs.values().find(|entry| entry.is_active()) {
            return Err(RegistryBusy {
                active_id: active.id.clone(),
            });
        }

        if runs.len() >= MAX_RUNS {
            let oldest = runs
                .values()
                .filter(|entry| !entry.is_active())
                .map(|entry| (entry.started_at, entry.id.clone()))
                .min();
            if let Some((_, oldest)) = oldest {
                runs.remove(&oldest);
            }
        }

        let entry = Arc::new(RunEntry::new(prompt));
        runs.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<RunEntry>> {
        self.runs.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    /// Cancel every run still searching.
    pub async fn cancel_all(&self) {
        for entry in self.runs.read().await.values() {
            entry.cancel.cancel();
        }
    }
}

/// Drive one run to completion and record its outcome.
pub async fn execute(
    agent: Arc<AgentLoop>,
    sessions: Arc<dyn ToolSessionFactory>,
    entry: Arc<RunEntry>,
) {
    info!(run_id = %entry.id, "Search run started");
    entry
        .log
        .info(LogSource::Integration, "INTEGRATION: Search request received, starting agent");

    let result = run_agent(
        &agent,
        sessions.as_ref(),
        &entry.prompt,
        &entry.log,
        entry.cancel.clone(),
    )
    .await;

    let phase = match result {
        Ok(outcome) => {
            entry.log.info(
                LogSource::Integration,
                format!(
                    "INTEGRATION: Final result received ({} chars, {})",
                    outcome.text.len(),
                    outcome.status
                ),
            );
            RunPhase::Finished(outcome)
        }
        Err(e) => {
            warn!(run_id = %entry.id, error = %e, "Search run failed");
            entry.log.error(LogSource::Integration, format!("INTEGRATION: {e}"));
            RunPhase::Failed(e.to_string())
        }
    };
    entry.finish(phase);
}
