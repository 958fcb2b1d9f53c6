//! MCP server that reads JSON-RPC 2.0 messages from stdin and writes
//! responses to stdout.
//!
//! Each request is handled on its own task so that a slow code2flow run does
//! not hold up other calls. Tool execution and resource reads run on the
//! blocking pool; a single writer task serialises responses, one per line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dispatcher::{ToolDispatcher, ToolName, ToolRequest};
use crate::errors::{Code2FlowError, Result};
use crate::registry::ResourceContent;
use crate::resources::{get_resource_definitions, get_resource_templates, resolve_resource};

use super::tools::{get_tool_definitions, to_call_result};
use super::transport::{ErrorCode, JsonRpcRequest, JsonRpcResponse};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Runtime counters, logged when the server shuts down.
struct ServerStats {
    started_at: Instant,
    total_requests: AtomicU64,
    tool_calls: AtomicU64,
    errors: AtomicU64,
}

impl ServerStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            tool_calls: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

/// The MCP server wrapping a `ToolDispatcher`.
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Arc<ToolDispatcher>,
    stats: Arc<ServerStats>,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::new()),
        }
    }

    /// Serves stdin/stdout until stdin is closed.
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serves line-delimited JSON-RPC from `reader`, writing responses to `writer`.
    ///
    /// Returns once the reader reaches EOF and every in-flight request has
    /// been answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "failed to read from input, server stopping");
                    break;
                }
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(JsonRpcResponse::error(
                        Value::Null,
                        ErrorCode::ParseError,
                        format!("request is not valid UTF-8: {}", e),
                    ));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => {
                    let server = self.clone();
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = server.handle_request(request).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(JsonRpcResponse::error(
                        Value::Null,
                        ErrorCode::ParseError,
                        format!("failed to parse JSON-RPC request: {}", e),
                    ));
                }
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    warn!(error = %e, "request task failed");
                }
            }
        }

        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "request task failed");
            }
        }
        drop(tx);
        if let Err(e) = writer_task.await {
            warn!(error = %e, "response writer failed");
        }

        info!(
            uptime_secs = self.stats.started_at.elapsed().as_secs(),
            total_requests = self.stats.total_requests.load(Ordering::Relaxed),
            tool_calls = self.stats.tool_calls.load(Ordering::Relaxed),
            errors = self.stats.errors.load(Ordering::Relaxed),
            "stdin closed, server stopping"
        );
        Ok(())
    }

    /// Dispatches a parsed request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!(method = %request.method, "request received");

        if request.is_notification() {
            return None;
        }

        let id = request.id.clone();
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": get_tool_definitions() })),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(
                id,
                json!({ "resources": get_resource_definitions(self.dispatcher.registry()) }),
            ),
            "resources/templates/list" => JsonRpcResponse::success(
                id,
                json!({ "resourceTemplates": get_resource_templates() }),
            ),
            "resources/read" => self.handle_resources_read(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("method not found: {}", request.method),
            ),
        };

        if response.error.is_some() {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        }
        Some(response)
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": "code2flow-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    /// Runs a tool on the blocking pool. Tool failures become `isError` results,
    /// not JSON-RPC errors.
    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                "missing params for tools/call".to_string(),
            );
        };
        let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
            return JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                "missing 'name' in tools/call params".to_string(),
            );
        };

        self.stats.tool_calls.fetch_add(1, Ordering::Relaxed);
        let request = ToolRequest::new(
            tool_name,
            params.get("arguments").cloned().unwrap_or(Value::Null),
        );
        let tool = ToolName::from_name(&request.tool_name);

        let dispatcher = Arc::clone(&self.dispatcher);
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(&request)).await {
            Ok(result) => JsonRpcResponse::success(id, to_call_result(tool, result)),
            Err(e) => JsonRpcResponse::error(
                id,
                ErrorCode::InternalError,
                format!("tool execution failed: {}", e),
            ),
        }
    }

    async fn handle_resources_read(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(uri) = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return JsonRpcResponse::error(
                id,
                ErrorCode::InvalidParams,
                "missing 'uri' in resources/read params".to_string(),
            );
        };

        let registry = Arc::clone(self.dispatcher.registry());
        let lookup = uri.clone();
        let resolved =
            tokio::task::spawn_blocking(move || resolve_resource(&registry, &lookup)).await;

        match resolved {
            Ok(Some(content)) => {
                JsonRpcResponse::success(id, json!({ "contents": [resource_contents(content)] }))
            }
            Ok(None) => {
                let data = json!({ "uri": uri });
                JsonRpcResponse::error_with_data(
                    id,
                    ErrorCode::ResourceNotFound,
                    Code2FlowError::ResourceNotFound { uri }.to_string(),
                    Some(data),
                )
            }
            Err(e) => JsonRpcResponse::error(
                id,
                ErrorCode::InternalError,
                format!("resource read failed: {}", e),
            ),
        }
    }
}

/// Text resources are sent as `text`, everything else as base64 `blob`.
fn resource_contents(content: ResourceContent) -> Value {
    let is_text =
        content.mime_type.starts_with("text/") || content.mime_type == "application/json";
    if is_text {
        json!({
            "uri": content.uri,
            "mimeType": content.mime_type,
            "text": String::from_utf8_lossy(&content.bytes),
        })
    } else {
        json!({
            "uri": content.uri,
            "mimeType": content.mime_type,
            "blob": BASE64.encode(&content.bytes),
        })
    }
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let json_line = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                continue;
            }
        };
        let output = format!("{}\n", json_line);
        if let Err(e) = writer.write_all(output.as_bytes()).await {
            warn!(error = %e, "failed to write response");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!(error = %e, "failed to flush output");
            break;
        }
    }
}
