//! `roomscout search`: one search, answer on stdout.

use std::sync::Arc;

use roomscout_agent::{AgentLoop, RunOutcome, run_agent};
use roomscout_core::event::RunLog;
use roomscout_providers::AnthropicProvider;
use roomscout_tools::McpSessionFactory;
use tokio_util::sync::CancellationToken;
use tracing::info;

const NO_RESULTS: &str = "No results found. Please try a different search.";

pub async fn run(
    prompt: String,
    max_tool_calls: Option<u32>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if let Some(max) = max_tool_calls {
        config.agent.max_tool_calls = max;
    }
    if let Some(model) = model {
        config.agent.model = model;
    }
    config.validate()?;
    let api_key = super::require_api_key(&config)?;

    let provider = Arc::new(AnthropicProvider::new(api_key).with_base_url(&config.api_url));
    let agent = AgentLoop::new(provider).with_config(config.agent_config());
    let sessions = McpSessionFactory::new(config.mcp.clone());
    let log = RunLog::new(uuid::Uuid::new_v4().to_string(), 256);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    info!(run_id = %log.run_id(), model = %config.agent.model, "Search started");
    eprintln!("  Searching with {} ...", config.agent.model);
    let outcome = run_agent(&agent, &sessions, &prompt, &log, cancel).await?;

    println!("{}", render_answer(&outcome));
    eprintln!();
    eprintln!("  {}", render_summary(&outcome));

    Ok(check_status(&outcome)?)
}

/// Runs that produced an answer succeed; every other ending is an error exit.
pub(crate) fn check_status(outcome: &RunOutcome) -> Result<(), String> {
    if outcome.status.is_success() {
        Ok(())
    } else {
        Err(format!("Search ended early: {}", outcome.status))
    }
}

/// The text shown to the user, never blank.
pub(crate) fn render_answer(outcome: &RunOutcome) -> String {
    if outcome.text.trim().is_empty() {
        NO_RESULTS.to_string()
    } else {
        outcome.text.clone()
    }
}

pub(crate) fn render_summary(outcome: &RunOutcome) -> String {
    let calls = match outcome.tool_calls {
        1 => "1 tool call".to_string(),
        n => format!("{n} tool calls"),
    };
    format!("Status: {} ({calls})", outcome.status)
}
