//! The agent tool-calling loop.
//!
//! States: `Starting → AwaitingLlm → (DispatchingTool → AwaitingLlm)* → Done`,
//! plus a failed terminal reached only when an LLM call faults twice in a row.
//!
//! Each round asks the LLM for the next step. A response without tool-use
//! blocks ends the run with its text. Otherwise the first tool-use block is
//! dispatched, its request and result are appended to the conversation and
//! the conversation is replayed. The tool budget counts dispatched calls;
//! running out is not an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roomscout_core::agent::{AgentConfig, RunStatus};
use roomscout_core::error::ToolDiscoveryError;
use roomscout_core::event::{LogSource, RunLog};
use roomscout_core::message::{Conversation, ToolOutcome, Turn};
use roomscout_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use roomscout_core::tool::{ToolSession, ToolSessionFactory};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog;
use crate::dispatcher::dispatch;
use crate::selection::select_tool_call;

/// What a finished run hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Final text. Empty is valid; read it together with `status`.
    pub text: String,
    pub status: RunStatus,
    /// Tool calls dispatched.
    pub tool_calls: u32,
    /// Every stored turn. The final LLM response is not stored.
    #[serde(skip)]
    pub conversation: Conversation,
}

/// Per-run mutable state, owned by one `run` invocation.
struct RunState {
    tool_call_count: u32,
    max_tool_calls: u32,
    conversation: Conversation,
    /// Call id of a tool request still waiting for its result.
    pending_call: Option<String>,
}

impl RunState {
    fn new(prompt: &str, max_tool_calls: u32) -> Self {
        Self {
            tool_call_count: 0,
            max_tool_calls,
            conversation: Conversation::with_prompt(prompt),
            pending_call: None,
        }
    }

    fn budget_left(&self) -> bool {
        self.tool_call_count < self.max_tool_calls
    }

    /// Answer an abandoned tool request so every request keeps its result.
    fn abandon_pending(&mut self, reason: &str) {
        if let Some(call_id) = self.pending_call.take() {
            self.conversation
                .append(Turn::tool_result(call_id, ToolOutcome::Err(reason.into())));
        }
    }
}

/// The core agent loop that orchestrates LLM calls and tool dispatch.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Model, prompt, budget and timing knobs
    config: AgentConfig,
}

impl AgentLoop {
    /// Create a new agent loop with default settings.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            config: AgentConfig::default(),
        }
    }

    /// Replace all settings.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of tool dispatches per run.
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.config.max_tool_calls = max;
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the loop for `prompt` against an initialized tool session.
    ///
    /// Only a failed tool discovery is returned as an error; every other
    /// ending is a [`RunOutcome`] with its [`RunStatus`].
    pub async fn run(
        &self,
        prompt: &str,
        session: &dyn ToolSession,
        log: &RunLog,
    ) -> Result<RunOutcome, ToolDiscoveryError> {
        self.run_with_cancel(prompt, session, log, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), abandoning the run as soon as `cancel` fires
    /// or the configured run timeout elapses.
    pub async fn run_with_cancel(
        &self,
        prompt: &str,
        session: &dyn ToolSession,
        log: &RunLog,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, ToolDiscoveryError> {
        info!(
            run_id = %log.run_id(),
            model = %self.config.model,
            max_tool_calls = self.config.max_tool_calls,
            "Starting agent run"
        );
        log.info(LogSource::Agent, format!("Running agent loop with prompt: {prompt}"));

        let mut state = RunState::new(prompt, self.config.max_tool_calls);
        let driven = self.drive(&mut state, session, log, &cancel);

        let ended = match self.config.run_timeout {
            Some(limit) => tokio::time::timeout(limit, driven).await.ok(),
            None => Some(driven.await),
        };

        let (status, text) = match ended {
            Some(ended) => ended?,
            None => {
                let limit = self.config.run_timeout.unwrap_or_default();
                log.error(
                    LogSource::Agent,
                    format!("Run timed out after {}s", limit.as_secs()),
                );
                state.abandon_pending("Run timed out");
                (RunStatus::TimedOut, String::new())
            }
        };

        log.info(
            LogSource::Agent,
            format!(
                "Agent finished ({status}) after {} tool calls",
                state.tool_call_count
            ),
        );

        Ok(RunOutcome {
            text,
            status,
            tool_calls: state.tool_call_count,
            conversation: state.conversation,
        })
    }

    async fn drive(
        &self,
        state: &mut RunState,
        session: &dyn ToolSession,
        log: &RunLog,
        cancel: &CancellationToken,
    ) -> Result<(RunStatus, String), ToolDiscoveryError> {
        // ── Starting ──
        let Some(tools) = guarded(cancel, catalog::discover(session, log)).await else {
            return Ok(cancelled(log));
        };
        let declarations = catalog::declarations(&tools?);

        log.info(LogSource::Llm, "Sending prompt to LLM");
        let mut response = match self.complete_with_retry(&state.conversation, &declarations, log, cancel).await {
            Ok(response) => response,
            Err(status) => return Ok((status, String::new())),
        };

        // ── AwaitingLlm ──
        loop {
            let Some(call) = select_tool_call(&response.content).cloned() else {
                log.info(LogSource::Llm, "LLM completed all tool calls and provided a final response");
                return Ok((RunStatus::Completed, response.text()));
            };

            if !state.budget_left() {
                log.warn(
                    LogSource::Agent,
                    format!(
                        "Reached maximum tool call limit of {}. Stopping further tool calls.",
                        state.max_tool_calls
                    ),
                );
                return Ok((RunStatus::BudgetExhausted, response.text()));
            }

            state.tool_call_count += 1;
            let ignored = response.content.iter().filter(|b| b.as_tool_use().is_some()).count() - 1;
            if ignored > 0 {
                debug!(ignored, "Ignoring additional tool requests this round");
            }

            // ── DispatchingTool ──
            log.info(
                LogSource::Llm,
                format!(
                    "LLM is calling tool ({}/{}): {}",
                    state.tool_call_count, state.max_tool_calls, call.name
                ),
            );
            state
                .conversation
                .append(Turn::tool_request(&call.id, &call.name, call.input.clone()));
            state.pending_call = Some(call.id.clone());

            let Some(result) = guarded(cancel, dispatch(&call.name, &call.input, &call.id, session, log)).await else {
                state.abandon_pending("Run cancelled");
                return Ok(cancelled(log));
            };
            state.conversation.append(result);
            state.pending_call = None;

            if state.tool_call_count > 1 && !self.pause(self.config.inter_call_delay, "next LLM call", log, cancel).await {
                return Ok(cancelled(log));
            }
            if !self.pause(self.config.llm_call_delay, "LLM API call", log, cancel).await {
                return Ok(cancelled(log));
            }

            log.info(LogSource::Llm, "Getting LLM's next response with tool results...");
            response = match self.complete_with_retry(&state.conversation, &declarations, log, cancel).await {
                Ok(response) => response,
                Err(status) => return Ok((status, String::new())),
            };
        }
    }

    /// One LLM call, retried once after the backoff on a transport fault.
    ///
    /// `Err` carries the terminal status: `LlmUnavailable` or `Cancelled`.
    async fn complete_with_retry(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
        log: &RunLog,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, RunStatus> {
        let request = self.build_request(conversation, tools);

        let first = match guarded(cancel, self.provider.complete(request.clone())).await {
            None => return Err(cancelled(log).0),
            Some(result) => result,
        };
        let error = match first {
            Ok(response) => return Ok(self.received(response, log)),
            Err(e) => e,
        };

        log.error(LogSource::Llm, format!("Error getting LLM response: {error}"));
        log.warn(
            LogSource::Llm,
            format!("Waiting {}s before retrying...", self.config.retry_backoff.as_secs()),
        );
        if !self.pause(self.config.retry_backoff, "retry", log, cancel).await {
            return Err(cancelled(log).0);
        }

        match guarded(cancel, self.provider.complete(request)).await {
            None => Err(cancelled(log).0),
            Some(Ok(response)) => Ok(self.received(response, log)),
            Some(Err(e)) => {
                log.error(LogSource::Llm, format!("Failed to get LLM response after retry: {e}"));
                Err(RunStatus::LlmUnavailable)
            }
        }
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> ProviderRequest {
        ProviderRequest {
            model: self.config.model.clone(),
            system: self.config.system_prompt.clone(),
            messages: conversation.snapshot(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: tools.to_vec(),
        }
    }

    fn received(&self, response: ProviderResponse, log: &RunLog) -> ProviderResponse {
        log.info(
            LogSource::Llm,
            format!(
                "Received response from LLM ({} blocks, stop_reason: {})",
                response.content.len(),
                response.stop_reason.as_deref().unwrap_or("none")
            ),
        );
        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "LLM usage"
            );
        }
        response
    }

    /// Sleep unless cancelled. Returns `false` when the run should stop.
    async fn pause(&self, duration: Duration, before: &str, log: &RunLog, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return true;
        }
        log.info(
            LogSource::Agent,
            format!("Rate limiting: Waiting {}s before {before}...", duration.as_secs()),
        );
        guarded(cancel, tokio::time::sleep(duration)).await.is_some()
    }
}

/// Open a fresh tool session, run the loop, and always close the session.
///
/// A session that cannot be opened is reported as a discovery failure.
pub async fn run_agent(
    agent: &AgentLoop,
    sessions: &dyn ToolSessionFactory,
    prompt: &str,
    log: &RunLog,
    cancel: CancellationToken,
) -> Result<RunOutcome, ToolDiscoveryError> {
    log.info(LogSource::Integration, "INTEGRATION: Starting tool server session");
    let session = match sessions.open().await {
        Ok(session) => session,
        Err(e) => {
            log.error(LogSource::Mcp, format!("Failed to start tool server: {e}"));
            return Err(e.into());
        }
    };

    let outcome = agent.run_with_cancel(prompt, session.as_ref(), log, cancel).await;

    session.close().await;
    log.info(LogSource::Integration, "INTEGRATION: Tool server session closed");
    outcome
}

/// Race `fut` against cancellation. `None` means cancelled.
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn cancelled(log: &RunLog) -> (RunStatus, String) {
    log.warn(LogSource::Agent, "Run cancelled");
    (RunStatus::Cancelled, String::new())
}
