//! HTTP gateway for RoomScout.
//!
//! Accepts natural-language lodging searches, runs the agent in the
//! background, and exposes run status, filtered run logs (polling and SSE)
//! and listing cards to the embedded web UI.
//!
//! Built on Axum.

pub mod api;
pub mod cards;
pub mod filter;
pub mod frontend;
pub mod runs;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tracing::info;

use roomscout_agent::AgentLoop;
use roomscout_config::AppConfig;
use roomscout_core::tool::ToolSessionFactory;
use roomscout_providers::AnthropicProvider;
use roomscout_tools::McpSessionFactory;

use crate::runs::RunRegistry;

/// Request bodies are a single prompt.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
    pub sessions: Arc<dyn ToolSessionFactory>,
    pub runs: RunRegistry,
    /// Refuse new searches while one is still running.
    pub single_flight: bool,
}

impl GatewayState {
    pub fn new(agent: Arc<AgentLoop>, sessions: Arc<dyn ToolSessionFactory>) -> Self {
        Self {
            agent,
            sessions,
            runs: RunRegistry::new(),
            single_flight: true,
        }
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Wire the Anthropic provider and the MCP tool server from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or("No API key configured. Set ANTHROPIC_API_KEY or api_key in config.toml")?;

        let provider = Arc::new(AnthropicProvider::new(api_key).with_base_url(&config.api_url));
        let agent = AgentLoop::new(provider).with_config(config.agent_config());
        let sessions: Arc<dyn ToolSessionFactory> = Arc::new(McpSessionFactory::new(config.mcp.clone()));

        Ok(Self::new(Arc::new(agent), sessions).with_single_flight(config.gateway.single_flight))
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: API routes plus the embedded frontend.
pub fn build_router(state: SharedState) -> Router {
    api::api_router(state)
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(GatewayState::from_config(&config)?);
    let app = build_router(state.clone());

    info!(
        addr = %addr,
        model = %state.agent.config().model,
        single_flight = state.single_flight,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested, cancelling active runs");
    state.runs.cancel_all().await;
}
