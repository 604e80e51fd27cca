//! End-to-end integration tests for RoomScout.
//!
//! These exercise the full pipeline from a user prompt to the final answer:
//! the real Anthropic client against a local mock of the Messages API, the
//! real MCP client against an in-memory tool server, and the HTTP gateway.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use roomscout_agent::testing::*;
use roomscout_agent::{AgentLoop, run_agent};
use roomscout_core::agent::{AgentConfig, RunStatus};
use roomscout_core::event::RunLog;
use roomscout_core::message::{ToolOutcome, Turn};
use roomscout_core::provider::ContentBlock;
use roomscout_core::tool::ToolSessionFactory;
use roomscout_gateway::{GatewayState, build_router};
use roomscout_providers::AnthropicProvider;
use roomscout_tools::McpSession;

// ── Mock Messages API ────────────────────────────────────────────────────

/// Scripted `(status, body)` replies plus every request body received.
#[derive(Clone, Default)]
struct MockAnthropic {
    replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockAnthropic {
    fn new(replies: Vec<(StatusCode, Value)>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Serve on an ephemeral port and return the base URL.
    async fn serve(self) -> String {
        let app = Router::new()
            .route("/v1/messages", post(messages_handler))
            .with_state(self);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

async fn messages_handler(State(mock): State<MockAnthropic>, Json(body): Json<Value>) -> impl IntoResponse {
    mock.requests.lock().unwrap().push(body);
    let (status, reply) = mock
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .expect("MockAnthropic: no more replies");
    (status, Json(reply))
}

fn api_text(text: &str) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "id": "msg_text",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-7-sonnet-20250219",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 120, "output_tokens": 40}
        }),
    )
}

fn api_tool_use(id: &str, name: &str, input: Value) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "id": "msg_tool",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-7-sonnet-20250219",
            "content": [
                {"type": "text", "text": "Let me search for that."},
                {"type": "tool_use", "id": id, "name": name, "input": input}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 100, "output_tokens": 30}
        }),
    )
}

fn api_overloaded() -> (StatusCode, Value) {
    (
        StatusCode::from_u16(529).unwrap(),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    )
}

// ── In-memory tool server ────────────────────────────────────────────────

const SEARCH_PAYLOAD: &str = r#"{"searchUrl":"https://www.airbnb.com/s/Boston/homes","searchResults":[{"id":"7","url":"https://www.airbnb.com/rooms/7","listing":{"name":"Back Bay loft"}}]}"#;

/// An MCP server speaking newline-delimited JSON-RPC over a duplex stream.
async fn airbnb_server_session() -> McpSession {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, mut server_write) = tokio::io::split(server);

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = serde_json::from_str(&line).unwrap();
            let Some(id) = msg.get("id").cloned() else {
                continue;
            };
            let result = match msg["method"].as_str().unwrap_or_default() {
                "initialize" => json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "airbnb", "version": "0.1.3"}
                }),
                "tools/list" => json!({
                    "tools": [
                        {
                            "name": "airbnb_search",
                            "description": "Search for Airbnb listings",
                            "inputSchema": {"type": "object", "properties": {"location": {"type": "string"}}, "required": ["location"]}
                        },
                        {
                            "name": "airbnb_listing_details",
                            "description": "Get listing details",
                            "inputSchema": {"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}
                        }
                    ]
                }),
                "tools/call" => match msg["params"]["name"].as_str() {
                    Some("airbnb_search") => json!({
                        "content": [{"type": "text", "text": SEARCH_PAYLOAD}],
                        "isError": false
                    }),
                    _ => json!({
                        "content": [{"type": "text", "text": "Listing not found"}],
                        "isError": true
                    }),
                },
                _ => json!({}),
            };
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": result});
            if server_write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                break;
            }
        }
    });

    McpSession::connect(client_read, client_write, Duration::from_secs(5))
        .await
        .unwrap()
}

fn fast_config() -> AgentConfig {
    AgentConfig::default().without_delays()
}

// ── Full pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_through_real_clients() {
    let mock = MockAnthropic::new(vec![
        api_tool_use("toolu_01", "airbnb_search", json!({"location": "Boston", "adults": 2})),
        api_text("1. Back Bay loft - $420 total, 4.90/5 [View listing](https://www.airbnb.com/rooms/7)"),
    ]);
    let base_url = mock.clone().serve().await;

    let provider = Arc::new(AnthropicProvider::new("sk-ant-test").with_base_url(base_url));
    let agent = AgentLoop::new(provider)
        .with_config(fast_config())
        .with_system_prompt("You are a travel assistant AI specializing in finding accommodations.");
    let session = airbnb_server_session().await;
    let log = RunLog::new("e2e", 128);

    let outcome = agent
        .run("find lodging in Boston for 2 adults", &session, &log)
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.tool_calls, 1);
    assert!(outcome.text.contains("Back Bay loft"));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);

    // First call: prompt plus the discovered catalog.
    assert_eq!(requests[0]["messages"].as_array().unwrap().len(), 1);
    assert_eq!(requests[0]["tools"][0]["name"], "airbnb_search");
    assert_eq!(requests[0]["tools"][0]["input_schema"]["required"][0], "location");
    assert!(requests[0]["system"].as_str().unwrap().contains("travel assistant"));

    // Second call: the tool request and its enveloped result are replayed.
    let messages = requests[1]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[1]["content"][0]["id"], "toolu_01");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_01");
    let envelope: Value =
        serde_json::from_str(messages[2]["content"][0]["content"].as_str().unwrap()).unwrap();
    assert_eq!(envelope["result"], SEARCH_PAYLOAD);

    assert!(log.lines().iter().any(|l| l.message == "Found 1 search results"));
    session.shutdown().await;
}

#[tokio::test]
async fn e2e_tool_error_reaches_llm() {
    let mock = MockAnthropic::new(vec![
        api_tool_use("toolu_02", "airbnb_listing_details", json!({"id": "missing"})),
        api_text("That listing is no longer available."),
    ]);
    let base_url = mock.clone().serve().await;

    let provider = Arc::new(AnthropicProvider::new("sk-ant-test").with_base_url(base_url));
    let agent = AgentLoop::new(provider).with_config(fast_config());
    let session = airbnb_server_session().await;
    let log = RunLog::new("e2e", 64);

    let outcome = agent.run("details for listing missing", &session, &log).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);

    let envelope: Value = serde_json::from_str(
        mock.requests()[1]["messages"][2]["content"][0]["content"]
            .as_str()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(envelope["error"], "Listing not found");
    session.shutdown().await;
}

#[tokio::test]
async fn e2e_overloaded_api_twice_is_unavailable() {
    let mock = MockAnthropic::new(vec![api_overloaded(), api_overloaded()]);
    let base_url = mock.clone().serve().await;

    let provider = Arc::new(AnthropicProvider::new("sk-ant-test").with_base_url(base_url));
    let agent = AgentLoop::new(provider).with_config(fast_config());
    let session = airbnb_server_session().await;
    let log = RunLog::new("e2e", 64);

    let outcome = agent.run("Boston", &session, &log).await.unwrap();
    assert_eq!(outcome.status, RunStatus::LlmUnavailable);
    assert_eq!(outcome.text, "");
    assert_eq!(mock.requests().len(), 2);
    session.shutdown().await;
}

// ── Scenarios ────────────────────────────────────────────────────────────

/// Zero tool calls: the answer is returned verbatim.
#[tokio::test]
async fn scenario_a_direct_answer() {
    let provider = Arc::new(ScriptedProvider::single_text("Here are three cozy places in Boston."));
    let factory = MockSessionFactory::new(MockToolSession::new(airbnb_tools()));
    let agent = AgentLoop::new(provider.clone()).with_config(fast_config());
    let log = RunLog::new("a", 64);

    let outcome = run_agent(&agent, &factory, "find lodging in Boston for 1 night", &log, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text, "Here are three cozy places in Boston.");
    assert_eq!(provider.call_count(), 1);
    assert!(factory.session().calls().is_empty());
}

/// One tool call, then the answer; three stored turns.
#[tokio::test]
async fn scenario_b_one_tool_call() {
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_use_response("toolu_1", "airbnb_search", json!({"location": "Boston"})),
        text_response("Two great places."),
    ]));
    let factory = MockSessionFactory::new(MockToolSession::new(airbnb_tools()));
    let agent = AgentLoop::new(provider.clone()).with_config(fast_config());
    let log = RunLog::new("b", 64);

    let outcome = run_agent(&agent, &factory, "Boston", &log, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text, "Two great places.");
    assert_eq!(provider.call_count(), 2);
    let turns = outcome.conversation.turns();
    assert_eq!(turns.len(), 3);
    assert!(matches!(&turns[1], Turn::ToolRequest { call_id, .. } if call_id == "toolu_1"));
    assert!(matches!(&turns[2], Turn::ToolResult { call_id, outcome: ToolOutcome::Ok(_) } if call_id == "toolu_1"));
    assert!(factory.session().is_closed());
}

/// The LLM never stops asking for tools: exactly five dispatches.
#[tokio::test]
async fn scenario_c_budget_exhaustion() {
    let mut replies = Vec::new();
    for i in 0..5 {
        replies.push(tool_use_response(&format!("c{i}"), "airbnb_search", json!({"page": i})));
    }
    replies.push(response(vec![
        ContentBlock::text("Still searching"),
        ContentBlock::tool_use("c5", "airbnb_search", json!({"page": 5})),
    ]));
    let provider = Arc::new(ScriptedProvider::responses(replies));
    let factory = MockSessionFactory::new(MockToolSession::new(airbnb_tools()));
    let agent = AgentLoop::new(provider.clone()).with_config(fast_config());
    let log = RunLog::new("c", 128);

    let outcome = run_agent(&agent, &factory, "Tokyo", &log, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(factory.session().calls().len(), 5);
    assert_eq!(provider.call_count(), 6);
    assert_eq!(outcome.status, RunStatus::BudgetExhausted);
    assert_eq!(outcome.text, "Still searching");
    assert!(log.lines().iter().any(|l| l.message.contains("maximum tool call limit of 5")));
}

/// The LLM fails twice: empty text, distinct status.
#[tokio::test]
async fn scenario_d_llm_failure() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(overloaded()), Err(overloaded())]));
    let factory = MockSessionFactory::new(MockToolSession::new(airbnb_tools()));
    let agent = AgentLoop::new(provider.clone()).with_config(fast_config());
    let log = RunLog::new("d", 64);

    let outcome = run_agent(&agent, &factory, "Berlin", &log, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text, "");
    assert_eq!(outcome.status, RunStatus::LlmUnavailable);
    assert_eq!(provider.call_count(), 2);
}

// ── Gateway ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_search_to_cards() {
    let provider = Arc::new(ScriptedProvider::responses(vec![
        tool_use_response("toolu_1", "airbnb_search", json!({"location": "Boston"})),
        text_response("1. Back Bay loft - $420 total, rated 4.90/5. [View listing](https://www.airbnb.com/rooms/7)"),
    ]));
    let agent = AgentLoop::new(provider).with_config(fast_config());
    let sessions: Arc<dyn ToolSessionFactory> =
        Arc::new(MockSessionFactory::new(MockToolSession::new(airbnb_tools())));
    let state = Arc::new(GatewayState::new(Arc::new(agent), sessions));

    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/search")
                .header("content-type", "application/json")
                .body(Body::from(json!({"prompt": "Boston"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let started: Value = serde_json::from_slice(&body).unwrap();
    let run_id = started["run_id"].as_str().unwrap().to_string();

    let mut status = Value::Null;
    for _ in 0..200 {
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/runs/{run_id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        status = serde_json::from_slice(&body).unwrap();
        if status["done"] == true {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status["status"], "done");
    assert_eq!(status["run_status"], "completed");
    assert_eq!(status["tool_calls"], 1);

    let response = build_router(state)
        .oneshot(
            Request::builder()
                .uri(format!("/runs/{run_id}/cards"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let cards: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(cards["count"], 1);
    assert_eq!(cards["cards"][0]["url"], "https://www.airbnb.com/rooms/7");
    assert_eq!(cards["cards"][0]["rating"], "4.90");
}
