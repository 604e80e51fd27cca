//! Scripted providers and in-memory tool sessions for tests.
//!
//! Compiled for this crate's own tests and, with the `testing` feature, for
//! downstream crates' tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roomscout_core::error::{ProviderError, ToolError};
use roomscout_core::provider::{ContentBlock, Provider, ProviderRequest, ProviderResponse, Usage};
use roomscout_core::tool::{CallToolResult, ToolDescriptor, ToolSession, ToolSessionFactory};
use serde_json::json;

/// A provider that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue.
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Only successful responses.
    pub fn responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::responses(vec![text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut replies = self.replies.lock().unwrap();
        let call = requests.len();
        requests.push(request);
        replies
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no more replies (call #{call})"))
    }
}

/// A provider whose calls never complete.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

/// An in-memory tool session with canned results per tool name.
///
/// Tools without a canned result answer with a generic success.
pub struct MockToolSession {
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, Result<CallToolResult, ToolError>>,
    fail_discovery: bool,
    hang_calls: bool,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    closed: AtomicBool,
}

impl MockToolSession {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            results: HashMap::new(),
            fail_discovery: false,
            hang_calls: false,
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_result(mut self, tool: &str, result: Result<CallToolResult, ToolError>) -> Self {
        self.results.insert(tool.to_string(), result);
        self
    }

    pub fn with_failing_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Record tool calls but never answer them.
    pub fn with_hanging_calls(mut self) -> Self {
        self.hang_calls = true;
        self
    }

    /// Every `(tool, input)` received so far, in order.
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolSession for MockToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if self.fail_discovery {
            return Err(ToolError::Transport("server exited during tools/list".into()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, input: serde_json::Value) -> Result<CallToolResult, ToolError> {
        self.calls.lock().unwrap().push((name.to_string(), input));
        if self.hang_calls {
            return std::future::pending().await;
        }
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(CallToolResult::success(format!("{name} ok"))))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out the same shared mock session on every `open`.
pub struct MockSessionFactory {
    session: Arc<MockToolSession>,
    opened: AtomicUsize,
    fail_open: bool,
}

impl MockSessionFactory {
    pub fn new(session: MockToolSession) -> Self {
        Self {
            session: Arc::new(session),
            opened: AtomicUsize::new(0),
            fail_open: false,
        }
    }

    /// A factory whose server never starts.
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new(MockToolSession::new(Vec::new()))
        }
    }

    pub fn session(&self) -> Arc<MockToolSession> {
        Arc::clone(&self.session)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolSessionFactory for MockSessionFactory {
    async fn open(&self) -> Result<Arc<dyn ToolSession>, ToolError> {
        if self.fail_open {
            return Err(ToolError::Transport("failed to spawn npx: No such file or directory".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let session: Arc<dyn ToolSession> = self.session.clone();
        Ok(session)
    }
}

/// The two tools the Airbnb MCP server advertises.
pub fn airbnb_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "airbnb_search".into(),
            description: "Search for Airbnb listings with various filters".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "checkin": {"type": "string"},
                    "checkout": {"type": "string"},
                    "adults": {"type": "number"}
                },
                "required": ["location"]
            }),
        },
        ToolDescriptor {
            name: "airbnb_listing_details".into(),
            description: "Get detailed information about a specific Airbnb listing".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            }),
        },
    ]
}

/// A response made of text blocks only.
pub fn text_response(text: &str) -> ProviderResponse {
    response(vec![ContentBlock::text(text)])
}

/// A response requesting one tool.
pub fn tool_use_response(id: &str, name: &str, input: serde_json::Value) -> ProviderResponse {
    response(vec![ContentBlock::tool_use(id, name, input)])
}

/// A response with the given blocks.
pub fn response(content: Vec<ContentBlock>) -> ProviderResponse {
    ProviderResponse {
        content,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        stop_reason: None,
    }
}

/// A transport-level LLM fault.
pub fn overloaded() -> ProviderError {
    ProviderError::ApiError {
        status_code: 529,
        message: "Overloaded".into(),
    }
}
