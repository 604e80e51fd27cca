//! HTTP API: search submission, run status, run logs, listing cards.
//!
//! Endpoints:
//!
//! - `GET  /health`                 : Liveness and version
//! - `GET  /ping`                   : Keep-alive with server time
//! - `POST /search`                 : Start a background search run
//! - `GET  /runs/{id}/status`       : Poll a run
//! - `GET  /runs/{id}/status/stream`: Current status then every change (SSE)
//! - `GET  /runs/{id}/logs`         : Filtered log backlog
//! - `GET  /runs/{id}/logs/stream`  : Filtered log backlog then live lines (SSE)
//! - `GET  /runs/{id}/cards`        : Listing cards from the final answer
//! - `GET  /tools`                  : Tool catalog of a fresh tool session

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{info, warn};

use roomscout_core::agent::RunStatus;
use roomscout_core::event::LogLine;

use crate::SharedState;
use crate::cards::{ListingCard, extract_cards};
use crate::filter::LogFilter;
use crate::runs::{self, RunEntry, RunPhase};

const NO_RESULTS_MESSAGE: &str = "No results found. Please try a different search.";
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(10);

// ── Router ────────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/search", post(search_handler))
        .route("/runs/{id}/status", get(status_handler))
        .route("/runs/{id}/status/stream", get(status_stream_handler))
        .route("/runs/{id}/logs", get(logs_handler))
        .route("/runs/{id}/logs/stream", get(log_stream_handler))
        .route("/runs/{id}/cards", get(cards_handler))
        .route("/tools", get(tools_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub run_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatusResponse {
    pub run_id: String,
    /// `searching`, `done` or `error`.
    pub status: String,
    pub done: bool,
    pub final_result: String,
    pub result_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_status: Option<RunStatus>,
    pub tool_calls: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardsResponse {
    pub run_id: String,
    pub cards: Vec<ListingCard>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct PingResponse {
    status: &'static str,
    timestamp: i64,
}

async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// `POST /search`: start a run in the background and return its id.
async fn search_handler(
    State(state): State<SharedState>,
    Json(payload): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Prompt must not be empty"));
    }

    let entry = state
        .runs
        .begin(prompt, state.single_flight)
        .await
        .map_err(|busy| {
            warn!(active = %busy.active_id, "Search refused, run in progress");
            api_error(StatusCode::CONFLICT, busy.to_string())
        })?;

    info!(run_id = %entry.id, "Search accepted");
    tokio::spawn(runs::execute(
        state.agent.clone(),
        state.sessions.clone(),
        entry.clone(),
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchResponse {
            run_id: entry.id.clone(),
            status: "searching".into(),
        }),
    ))
}

async fn find_run(state: &SharedState, id: &str) -> Result<Arc<RunEntry>, ApiError> {
    state
        .runs
        .get(id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Run not found: {id}")))
}

/// `GET /runs/{id}/status`
async fn status_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RunStatusResponse>, ApiError> {
    let entry = find_run(&state, &id).await?;
    Ok(Json(status_response(id, entry.phase())))
}

/// `GET /runs/{id}/status/stream`: the current status, then one event per change.
async fn status_stream_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let entry = find_run(&state, &id).await?;
    info!(run_id = %id, "Status stream subscriber connected");

    let stream = WatchStream::new(entry.watch_phase()).map(move |phase| {
        let data = serde_json::to_string(&status_response(id.clone(), phase)).unwrap_or_default();
        Ok(SseEvent::default().event("status").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE)))
}

fn status_response(id: String, phase: RunPhase) -> RunStatusResponse {
    match phase {
        RunPhase::Searching => RunStatusResponse {
            run_id: id,
            status: "searching".into(),
            done: false,
            final_result: String::new(),
            result_length: 0,
            run_status: None,
            tool_calls: 0,
            message: None,
        },
        RunPhase::Finished(outcome) => RunStatusResponse {
            run_id: id,
            status: "done".into(),
            done: true,
            result_length: outcome.text.len(),
            message: outcome.text.is_empty().then(|| NO_RESULTS_MESSAGE.to_string()),
            final_result: outcome.text,
            run_status: Some(outcome.status),
            tool_calls: outcome.tool_calls,
        },
        RunPhase::Failed(error) => RunStatusResponse {
            run_id: id,
            status: "error".into(),
            done: true,
            final_result: String::new(),
            result_length: 0,
            run_status: None,
            tool_calls: 0,
            message: Some(error),
        },
    }
}

/// `GET /runs/{id}/logs?filter=`
async fn logs_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogLine>>, ApiError> {
    let entry = find_run(&state, &id).await?;
    let filter = LogFilter::parse(query.filter.as_deref());
    let lines = entry
        .log
        .lines()
        .into_iter()
        .filter(|line| filter.accepts(line))
        .collect();
    Ok(Json(lines))
}

/// `GET /runs/{id}/logs/stream?filter=`: backlog first, then live lines.
async fn log_stream_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let entry = find_run(&state, &id).await?;
    let filter = LogFilter::parse(query.filter.as_deref());
    info!(run_id = %id, ?filter, "Log stream subscriber connected");

    let (backlog, rx) = entry.log.follow();
    let replay = tokio_stream::iter(backlog.into_iter().map(Arc::new));
    // Lagged subscribers skip the lines they missed.
    let live = BroadcastStream::new(rx).filter_map(|line| line.ok());

    let stream = replay
        .chain(live)
        .filter(move |line| filter.accepts(line))
        .map(|line| {
            let data = serde_json::to_string(line.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event("log").data(data))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE)))
}

/// `GET /runs/{id}/cards`
async fn cards_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CardsResponse>, ApiError> {
    let entry = find_run(&state, &id).await?;
    let cards = match entry.phase() {
        RunPhase::Finished(outcome) => extract_cards(&outcome.text),
        RunPhase::Searching | RunPhase::Failed(_) => Vec::new(),
    };
    Ok(Json(CardsResponse {
        run_id: id,
        count: cards.len(),
        cards,
    }))
}

/// `GET /tools`: open a short-lived tool session and list its catalog.
async fn tools_handler(State(state): State<SharedState>) -> Result<Json<ToolListResponse>, ApiError> {
    let session = state
        .sessions
        .open()
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, format!("Tool server unavailable: {e}")))?;
    let listed = session.list_tools().await;
    session.close().await;

    let tools: Vec<ToolInfo> = listed
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, format!("Tool discovery failed: {e}")))?
        .into_iter()
        .map(|t| ToolInfo {
            name: t.name,
            description: t.description,
            input_schema: t.input_schema,
        })
        .collect();

    Ok(Json(ToolListResponse {
        count: tools.len(),
        tools,
    }))
}
