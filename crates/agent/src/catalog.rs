//! Tool catalog discovery.

use roomscout_core::error::ToolDiscoveryError;
use roomscout_core::event::{LogSource, RunLog};
use roomscout_core::provider::ToolDefinition;
use roomscout_core::tool::{ToolDescriptor, ToolSession};

/// Enumerate the tools offered by an already-initialized session.
///
/// Not retried: a failure here ends the run.
pub async fn discover(
    session: &dyn ToolSession,
    log: &RunLog,
) -> Result<Vec<ToolDescriptor>, ToolDiscoveryError> {
    match session.list_tools().await {
        Ok(tools) => {
            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            log.info(LogSource::Mcp, format!("Available tools: {names:?}"));
            Ok(tools)
        }
        Err(e) => {
            log.error(LogSource::Mcp, format!("Failed to list tools: {e}"));
            Err(e.into())
        }
    }
}

/// The catalog in the LLM's tool-declaration format.
pub fn declarations(tools: &[ToolDescriptor]) -> Vec<ToolDefinition> {
    tools.iter().map(ToolDescriptor::to_definition).collect()
}
