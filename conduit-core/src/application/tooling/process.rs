use super::error::ToolInvokeError;
use crate::config::ServerConfig;
use crate::constants::PROTOCOL_VERSION;
use crate::domain::types::{ToolArguments, ToolDescriptor, ToolOutcome};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

/// One MCP server child process speaking newline-delimited JSON-RPC.
#[derive(Clone)]
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: ServerConfig,
    request_timeout: Duration,
    startup: AsyncMutex<()>,
    state: AsyncMutex<Option<RunningState>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, oneshot::Sender<Result<Value, ToolInvokeError>>>>,
    id_counter: AtomicU64,
    generation: AtomicU64,
    tools: AsyncMutex<Vec<ToolDescriptor>>,
}

struct RunningState {
    child: Child,
    generation: u64,
}

impl McpProcess {
    pub fn new(server: ServerConfig, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(McpProcessInner {
                server,
                request_timeout,
                startup: AsyncMutex::new(()),
                state: AsyncMutex::new(None),
                writer: AsyncMutex::new(None),
                pending: AsyncMutex::new(HashMap::new()),
                id_counter: AtomicU64::new(1),
                generation: AtomicU64::new(0),
                tools: AsyncMutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.server.name
    }

    /// Spawns the server and performs the initialize handshake if it is not
    /// already running.
    pub async fn ensure_running(&self) -> Result<(), ToolInvokeError> {
        self.inner.ensure_running().await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        self.ensure_running().await?;
        Ok(self.inner.tools.lock().await.clone())
    }

    pub async fn provides(&self, tool: &str) -> bool {
        self.inner
            .tools
            .lock()
            .await
            .iter()
            .any(|descriptor| descriptor.name == tool)
    }

    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutcome, ToolInvokeError> {
        self.ensure_running().await?;
        self.inner.call_tool(tool, arguments).await
    }

    /// Kills the child process and fails every request still waiting on it.
    pub async fn shutdown(&self) {
        info!(server = %self.inner.server.name, "Shutting down MCP server");
        self.inner.reset().await;
    }
}

impl McpProcessInner {
    async fn ensure_running(self: &Arc<Self>) -> Result<(), ToolInvokeError> {
        let _startup = self.startup.lock().await;
        {
            let state = self.state.lock().await;
            if state.is_some() {
                return Ok(());
            }
        }

        let mut command = Command::new(&self.server.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.server.workdir {
            command.current_dir(dir);
        }
        if !self.server.args.is_empty() {
            command.args(&self.server.args);
        }
        for (key, value) in &self.server.env {
            command.env(key, value);
        }

        debug!(
            server = %self.server.name,
            command = %self.server.command.display(),
            "Spawning MCP server"
        );
        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: self.server.name.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdout"))?;

        {
            let mut writer = self.writer.lock().await;
            *writer = Some(BufWriter::new(stdin));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().await;
            *state = Some(RunningState { child, generation });
        }

        let reader_self = Arc::clone(self);
        tokio::spawn(async move {
            reader_self.reader_loop(stdout, generation).await;
        });

        match self.initialize_sequence().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reset().await;
                Err(err)
            }
        }
    }

    async fn initialize_sequence(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        let init_result = self.send_request("initialize", params).await?;
        let protocol = init_result
            .get("protocolVersion")
            .and_then(|version| version.as_str())
            .unwrap_or("unknown");
        debug!(server = %self.server.name, protocol, "MCP server initialized");
        self.send_notification("notifications/initialized", json!({}))
            .await?;

        self.refresh_tools().await
    }

    async fn call_tool(
        self: &Arc<Self>,
        tool: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutcome, ToolInvokeError> {
        let params = json!({
            "name": tool,
            "arguments": Value::Object(arguments),
        });
        let id = self.next_id();
        let mut in_flight = InFlightCall {
            inner: Arc::clone(self),
            id: id.clone(),
            answered: false,
        };
        let result = self.request_with_id(id, "tools/call", params).await;
        in_flight.answered = !matches!(result, Err(ToolInvokeError::Timeout { .. }));
        Ok(tool_outcome_from_result(&result?))
    }

    async fn refresh_tools(&self) -> Result<(), ToolInvokeError> {
        let result = self.send_request("tools/list", json!({})).await?;
        let tools = descriptors_from_list(&result);
        debug!(
            server = %self.server.name,
            count = tools.len(),
            "Refreshed tool catalogue"
        );
        *self.tools.lock().await = tools;
        Ok(())
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout, generation: u64) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    if let Err(err) = self.process_inbound_message(value).await {
                        warn!(
                            server = %self.server.name,
                            %err,
                            "failed to process message from MCP server"
                        );
                    }
                }
                Err(source) => {
                    warn!(
                        server = %self.server.name,
                        line = trimmed,
                        %source,
                        "received invalid JSON from MCP server"
                    );
                }
            }
        }

        self.handle_exit(generation).await;
    }

    /// Resets only if the exited child is still the current one; a restart
    /// may already have replaced it.
    async fn handle_exit(&self, generation: u64) {
        let current = self
            .state
            .lock()
            .await
            .as_ref()
            .map(|running| running.generation);
        if current == Some(generation) {
            warn!(server = %self.server.name, "MCP server closed its output");
            self.reset().await;
        }
    }

    async fn process_inbound_message(
        self: &Arc<Self>,
        value: Value,
    ) -> Result<(), ToolInvokeError> {
        if let Some(id) = value.get("id").cloned() {
            if value.get("method").is_some() {
                self.handle_server_request(id, value).await
            } else {
                self.handle_response(id, value).await
            }
        } else if value.get("method").is_some() {
            self.handle_notification(value);
            Ok(())
        } else {
            Ok(())
        }
    }

    async fn handle_response(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let Some(key) = response_key(&id) else {
            return Ok(());
        };

        let responder = self.pending.lock().await.remove(&key);
        let Some(sender) = responder else {
            debug!(
                server = %self.server.name,
                response_id = key,
                "received response for unknown request"
            );
            return Ok(());
        };

        let outcome = match value.get("error") {
            Some(error) => {
                let rpc_error = match error.as_object() {
                    Some(err) => ToolInvokeError::Rpc {
                        server: self.server.name.clone(),
                        code: err.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                        message: err
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string(),
                    },
                    None => self.transport_error("missing error payload in response"),
                };
                Err(rpc_error)
            }
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
        Ok(())
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(
                    server = %self.server.name,
                    method = other,
                    "server sent unsupported request"
                );
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    fn handle_notification(self: &Arc<Self>, value: Value) {
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return;
        };
        debug!(
            server = %self.server.name,
            method,
            "received notification from server"
        );
        if method == "notifications/tools/list_changed" {
            // The reply arrives on this reader task, so the refresh must not block it.
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = inner.refresh_tools().await {
                    warn!(
                        server = %inner.server.name,
                        %err,
                        "failed to refresh tool catalogue"
                    );
                }
            });
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        self.request_with_id(self.next_id(), method, params).await
    }

    async fn request_with_id(
        &self,
        id: String,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolInvokeError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ToolInvokeError::Cancelled {
                server: self.server.name.clone(),
            }),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                warn!(server = %self.server.name, method, "MCP request timed out");
                Err(ToolInvokeError::Timeout {
                    server: self.server.name.clone(),
                    millis: self.request_timeout.as_millis(),
                })
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| self.transport_error("writer not initialised"))?;
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|source| self.transport_error(source.to_string()))?;
        Ok(())
    }

    /// Forgets a call nobody is waiting for and tells the server to stop
    /// working on it.
    async fn abandon_request(&self, id: String) {
        self.pending.lock().await.remove(&id);
        let params = json!({
            "requestId": id.as_str(),
            "reason": "request cancelled by client",
        });
        if let Err(err) = self.send_notification("notifications/cancelled", params).await {
            debug!(server = %self.server.name, %err, "could not send cancellation");
        } else {
            debug!(server = %self.server.name, request_id = %id, "Cancelled MCP request");
        }
    }

    async fn reset(&self) {
        self.writer.lock().await.take();

        let mut state = self.state.lock().await;
        if let Some(mut running) = state.take() {
            if let Err(err) = running.child.kill().await {
                debug!(
                    server = %self.server.name,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
        }
        drop(state);

        self.fail_all_pending().await;
        self.tools.lock().await.clear();
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            }));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

/// A `tools/call` in progress. Dropped before its answer arrives (the turn
/// was cancelled, or the request timed out), it cleans up after itself.
struct InFlightCall {
    inner: Arc<McpProcessInner>,
    id: String,
    answered: bool,
}

impl Drop for InFlightCall {
    fn drop(&mut self) {
        if self.answered {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let id = std::mem::take(&mut self.id);
        runtime.spawn(async move {
            inner.abandon_request(id).await;
        });
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

fn descriptors_from_list(result: &Value) -> Vec<ToolDescriptor> {
    let Some(array) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name").and_then(Value::as_str)?;
            let description = tool
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            let schema = tool.get("inputSchema").filter(|s| s.is_object()).cloned();
            Some(ToolDescriptor::new(name, description, schema))
        })
        .collect()
}

/// Flattens a `tools/call` result into text: text items verbatim, anything
/// else as compact JSON, joined by newlines.
fn tool_outcome_from_result(result: &Value) -> ToolOutcome {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut parts: Vec<String> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item.get("type").and_then(Value::as_str) {
                    Some("text") => item
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    _ => item.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        if let Some(structured) = result.get("structuredContent") {
            parts.push(structured.to_string());
        }
    }

    ToolOutcome {
        content: parts.join("\n"),
        is_error,
    }
}
