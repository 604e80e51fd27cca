//! Newline-delimited JSON-RPC 2.0 over a byte stream pair.
//!
//! Requests are written one JSON object per line. A background reader task
//! routes each response to the waiting request by `id`; server notifications
//! and anything that is not JSON are logged and skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, oneshot};

use crate::error::McpError;
use crate::protocol::{JsonRpcError, JsonRpcIncoming, JsonRpcNotification, JsonRpcRequest};

type Reply = Result<Value, JsonRpcError>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) struct JsonRpcTransport {
    writer: Mutex<Option<Writer>>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl JsonRpcTransport {
    /// Wrap a reader/writer pair and spawn the reader task.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let pending_clone = Arc::clone(&pending);
        let closed_clone = Arc::clone(&closed);
        let reader_task = tokio::spawn(async move {
            if let Err(e) = Self::read_loop(reader, Arc::clone(&pending_clone)).await {
                tracing::debug!(error = %e, "MCP reader exited");
            }
            closed_clone.store(true, Ordering::SeqCst);
            // Dropping the senders wakes every waiter with a closed channel.
            pending_clone.lock().await.clear();
        });

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader_task,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for the matching response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        if let Err(e) = self.send_line(&serde_json::to_value(&message)?).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(err))) => Err(McpError::Protocol {
                code: err.code,
                message: err.message,
            }),
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    method: method.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let message = JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        };
        self.send_line(&serde_json::to_value(&message)?).await
    }

    /// Close the write half. The server sees EOF on stdin.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    async fn send_line(&self, message: &Value) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::Closed)?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Io(format!("failed to write request: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::Io(format!("failed to flush: {e}")))?;
        Ok(())
    }

    async fn read_loop<R>(reader: R, pending: Pending) -> Result<(), McpError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| McpError::Io(format!("read: {e}")))?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let msg: JsonRpcIncoming = match serde_json::from_str(line) {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, line = %truncate(line, 120), "Skipping non-JSON-RPC line");
                    continue;
                }
            };

            match (msg.id.as_ref().and_then(Value::as_u64), msg.method) {
                (Some(id), None) => {
                    let reply = match msg.error {
                        Some(err) => Err(err),
                        None => Ok(msg.result.unwrap_or(Value::Null)),
                    };
                    if let Some(tx) = pending.lock().await.remove(&id) {
                        let _ = tx.send(reply);
                    } else {
                        tracing::debug!(id, "Response for unknown request id");
                    }
                }
                (_, Some(method)) => {
                    tracing::debug!(method = %method, "Server message ignored");
                }
                (None, None) => {
                    tracing::debug!("JSON-RPC message without id or method");
                }
            }
        }

        Ok(())
    }
}

impl Drop for JsonRpcTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
