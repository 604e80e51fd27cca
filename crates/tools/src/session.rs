//! An initialized MCP session with a tool server subprocess.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roomscout_config::McpServerConfig;
use roomscout_core::error::ToolError;
use roomscout_core::tool::{CallToolResult, ToolDescriptor, ToolSession, ToolSessionFactory};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::McpError;
use crate::protocol::{self, McpCallToolResult, McpInitializeResult, McpToolsListResult, ServerInfo};
use crate::transport::JsonRpcTransport;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Client side of one MCP connection.
///
/// Created by [`McpSession::spawn`] (child process over stdio) or
/// [`McpSession::connect`] (any byte stream pair). Both complete the
/// `initialize` handshake before returning. Call [`McpSession::shutdown`]
/// when done; dropping the session kills the child as a fallback.
pub struct McpSession {
    transport: JsonRpcTransport,
    child: Mutex<Option<Child>>,
    request_timeout: Duration,
    server_info: ServerInfo,
}

impl McpSession {
    /// Launch the configured server and perform the handshake.
    pub async fn spawn(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Spawn {
                command: config.command.clone(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Io("failed to capture stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Io("failed to capture stdout".into()))?;

        tracing::info!(command = %config.command, args = ?config.args, "Spawned MCP server");

        let mut session = Self::connect(
            stdout,
            stdin,
            Duration::from_secs(config.request_timeout_secs),
        )
        .await?;
        session.child = Mutex::new(Some(child));
        Ok(session)
    }

    /// Handshake over an existing byte stream pair.
    pub async fn connect<R, W>(reader: R, writer: W, request_timeout: Duration) -> Result<Self, McpError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let transport = JsonRpcTransport::new(reader, writer);

        let init = transport
            .request("initialize", Some(protocol::initialize_params()), request_timeout)
            .await?;
        let init: McpInitializeResult = serde_json::from_value(init)?;
        transport.notify("notifications/initialized", None).await?;

        tracing::info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = ?init.protocol_version,
            "MCP session initialized"
        );

        Ok(Self {
            transport,
            child: Mutex::new(None),
            request_timeout,
            server_info: init.server_info,
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Close stdin and wait for the server to exit, killing it if it lingers.
    pub async fn shutdown(&self) {
        self.transport.close().await;

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "MCP server exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to wait for MCP server"),
            Err(_) => {
                tracing::warn!("MCP server did not exit in time, killing");
                let _ = child.kill().await;
            }
        }
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
            let value = self
                .transport
                .request("tools/list", params, self.request_timeout)
                .await?;
            let page: McpToolsListResult = serde_json::from_value(value).map_err(McpError::from)?;
            tools.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, input: Value) -> Result<CallToolResult, ToolError> {
        let value = self
            .transport
            .request("tools/call", Some(protocol::call_params(name, input)), self.request_timeout)
            .await
            .map_err(|e| match e {
                McpError::Timeout { timeout_secs, .. } => ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs,
                },
                other => other.into(),
            })?;
        let result: McpCallToolResult = serde_json::from_value(value).map_err(McpError::from)?;
        Ok(result.into())
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

/// Spawns a fresh tool server per run from the configured command.
pub struct McpSessionFactory {
    config: McpServerConfig,
}

impl McpSessionFactory {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolSessionFactory for McpSessionFactory {
    async fn open(&self) -> Result<Arc<dyn ToolSession>, ToolError> {
        let session: Arc<dyn ToolSession> = Arc::new(McpSession::spawn(&self.config).await?);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Run a scripted MCP server on an in-memory stream and connect to it.
    async fn connect_to<F>(handler: F) -> McpSession
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + 'static,
    {
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
                let method = msg["method"].as_str().unwrap_or_default();
                let params = msg.get("params").cloned().unwrap_or(Value::Null);
                let reply = match method {
                    "initialize" => json!({
                        "jsonrpc": "2.0", "id": id,
                        "result": {
                            "protocolVersion": "2025-03-26",
                            "capabilities": {"tools": {}},
                            "serverInfo": {"name": "airbnb", "version": "0.1.3"}
                        }
                    }),
                    _ => match handler(method, &params) {
                        Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                        None => json!({
                            "jsonrpc": "2.0", "id": id,
                            "error": {"code": -32601, "message": "Method not found"}
                        }),
                    },
                };
                if server_write
                    .write_all(format!("{reply}\n").as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        McpSession::connect(client_read, client_write, Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn handshake_records_server_info() {
        let session = connect_to(|_, _| None).await;
        assert_eq!(session.server_info().name, "airbnb");
        assert_eq!(session.server_info().version, "0.1.3");
    }

    #[tokio::test]
    async fn list_tools_follows_cursor() {
        let session = connect_to(|method, params| {
            (method == "tools/list").then(|| match params.get("cursor").and_then(Value::as_str) {
                None => json!({
                    "tools": [{
                        "name": "airbnb_search",
                        "description": "Search Airbnb listings",
                        "inputSchema": {"type": "object", "required": ["location"]}
                    }],
                    "nextCursor": "page2"
                }),
                Some(_) => json!({
                    "tools": [{"name": "airbnb_listing_details", "inputSchema": {"type": "object"}}]
                }),
            })
        })
        .await;

        let tools = session.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["airbnb_search", "airbnb_listing_details"]);
        assert_eq!(tools[0].input_schema["required"][0], "location");
    }

    #[tokio::test]
    async fn call_tool_sends_arguments_and_maps_result() {
        let session = connect_to(|method, params| {
            (method == "tools/call").then(|| {
                assert_eq!(params["name"], "airbnb_search");
                assert_eq!(params["arguments"]["location"], "Boston");
                json!({
                    "content": [{"type": "text", "text": "{\"searchResults\":[{\"id\":\"1\"}]}"}],
                    "isError": false
                })
            })
        })
        .await;

        let result = session
            .call_tool("airbnb_search", json!({"location": "Boston"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.first_text().contains("searchResults"));
    }

    #[tokio::test]
    async fn tool_level_error_is_not_transport_error() {
        let session = connect_to(|_, _| {
            Some(json!({
                "content": [{"type": "text", "text": "Listing not found"}],
                "isError": true
            }))
        })
        .await;

        let result = session
            .call_tool("airbnb_listing_details", json!({"id": "0"}))
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.first_text(), "Listing not found");
    }

    #[tokio::test]
    async fn json_rpc_error_maps_to_protocol_error() {
        let session = connect_to(|_, _| None).await;
        let err = session.call_tool("nope", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::Protocol { code: -32601, .. }));
    }

    #[tokio::test]
    async fn shutdown_closes_session() {
        let session = connect_to(|_, _| Some(json!({"tools": []}))).await;
        session.shutdown().await;
        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, ToolError::SessionClosed));
    }

    #[tokio::test]
    async fn factory_surfaces_spawn_failure_as_transport_error() {
        let factory = McpSessionFactory::new(McpServerConfig {
            command: "/nonexistent/roomscout-mcp-server".into(),
            ..McpServerConfig::default()
        });
        let err = factory.open().await.err().unwrap();
        assert!(matches!(err, ToolError::Transport(ref m) if m.contains("failed to spawn")));
    }

    #[tokio::test]
    async fn spawn_missing_binary_fails() {
        let config = McpServerConfig {
            command: "/nonexistent/roomscout-mcp-server".into(),
            ..McpServerConfig::default()
        };
        let err = McpSession::spawn(&config).await.err().unwrap();
        assert!(matches!(err, McpError::Spawn { .. }));
    }
}
