//! MCP server over stdio: one JSON-RPC 2.0 message per line.
//!
//! Requests are answered in arrival order except `tools/call`, which runs on its own task so
//! the host can interleave calls. A single writer task owns the output stream.
//!
//! A tool call that fails with anything other than a validation error stops the server; the
//! caller is expected to exit the process. So does losing the output stream.

use crate::config::{SERVER_NAME, SERVER_VERSION};
use crate::error::{AdapterError, Result};
use crate::registry::{ToolDefinition, ToolHandler, ToolRegistry, ToolTable};
use rmcp::model::{
    CallToolRequestParams, ClientJsonRpcMessage, ClientRequest, CustomRequest, ErrorCode,
    ErrorData, Implementation, InitializeResult, JsonRpcMessage, JsonRpcRequest,
    ListPromptsResult, ListResourcesResult, ListToolsResult, ProtocolVersion, RequestId,
    ServerCapabilities, ServerJsonRpcMessage, ServerResult,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, AsyncWrite, AsyncWriteExt as _, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{Instrument as _, debug, error, info, info_span, warn};

const SUPPORTED_PROTOCOL_VERSIONS: [ProtocolVersion; 3] = [
    ProtocolVersion::V_2024_11_05,
    ProtocolVersion::V_2025_03_26,
    ProtocolVersion::V_2025_06_18,
];

/// Methods this server answers; a request for one of them that fails to parse is
/// `INVALID_PARAMS` rather than `METHOD_NOT_FOUND`.
const SERVED_METHODS: [&str; 6] = [
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "prompts/list",
];

type Outbox = mpsc::UnboundedSender<ServerJsonRpcMessage>;

pub struct StdioServer {
    tools: ToolTable,
}

impl Default for StdioServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry for StdioServer {
    fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        self.tools.register(definition, handler)
    }
}

impl StdioServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: ToolTable::new(),
        }
    }

    /// Serve the process's stdin/stdout until stdin closes.
    ///
    /// # Errors
    ///
    /// See [`Self::serve`].
    pub async fn serve_stdio(self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, writing responses to `writer`.
    ///
    /// Returns `Ok(())` once `reader` reaches EOF and every in-flight tool call has answered.
    ///
    /// # Errors
    ///
    /// Returns the first fatal tool-call error (backend unreachable, non-JSON backend body), or
    /// an IO error on either stream.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let tools = Arc::new(self.tools);
        let (tx, rx) = mpsc::unbounded_channel::<ServerJsonRpcMessage>();
        let mut writer_task = tokio::spawn(write_loop(writer, rx));
        let mut writer_stopped = false;

        let mut reader = BufReader::new(reader);
        // `read_until` keeps partial input here when another branch wins the select.
        let mut line = Vec::new();
        let mut calls: JoinSet<Result<()>> = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut line) => match read {
                    Ok(0) => break Ok(()),
                    Ok(_) => {
                        let handled = dispatch(&tools, &tx, &mut calls, &line);
                        line.clear();
                        if let Err(e) = handled {
                            break Err(e);
                        }
                    }
                    Err(e) => break Err(AdapterError::Io(e)),
                },
                Some(joined) = calls.join_next() => {
                    if let Err(e) = flatten_join(joined) {
                        break Err(e);
                    }
                }
                written = &mut writer_task => {
                    writer_stopped = true;
                    break Err(writer_failure(written));
                }
            }
        };

        let outcome = match outcome {
            Ok(()) => drain(&mut calls).await,
            Err(e) => {
                calls.abort_all();
                Err(e)
            }
        };

        drop(tx);
        if writer_stopped {
            return outcome;
        }
        let written = finish_writer(writer_task).await;
        outcome?;
        written
    }
}

async fn drain(calls: &mut JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = calls.join_next().await {
        if let Err(e) = flatten_join(joined) {
            calls.abort_all();
            return Err(e);
        }
    }
    Ok(())
}

fn flatten_join(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| AdapterError::Runtime(format!("tool call task failed: {e}")))?
}

async fn finish_writer(writer_task: JoinHandle<std::io::Result<()>>) -> Result<()> {
    writer_task
        .await
        .map_err(|e| AdapterError::Runtime(format!("stdout writer task failed: {e}")))?
        .map_err(AdapterError::Io)
}

fn writer_failure(written: std::result::Result<std::io::Result<()>, JoinError>) -> AdapterError {
    match written {
        Ok(Err(e)) => AdapterError::Io(e),
        Ok(Ok(())) => AdapterError::Runtime("stdout writer stopped".to_string()),
        Err(e) => AdapterError::Runtime(format!("stdout writer task failed: {e}")),
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<ServerJsonRpcMessage>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn deliver(tx: &Outbox, msg: ServerJsonRpcMessage) -> Result<()> {
    tx.send(msg)
        .map_err(|_| AdapterError::Runtime("stdout writer closed".to_string()))
}

/// Handle one raw input line. Only a lost output stream is an error here.
fn dispatch(
    tools: &Arc<ToolTable>,
    tx: &Outbox,
    calls: &mut JoinSet<Result<()>>,
    raw: &[u8],
) -> Result<()> {
    let Ok(text) = std::str::from_utf8(raw) else {
        warn!(bytes = raw.len(), "ignoring input line that is not UTF-8");
        return Ok(());
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let message: ClientJsonRpcMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "ignoring input line that is not a JSON-RPC message");
            return Ok(());
        }
    };

    // Notifications and client responses get no reply.
    let JsonRpcMessage::Request(JsonRpcRequest { id, request, .. }) = message else {
        debug!("ignoring non-request message");
        return Ok(());
    };

    let result = match request {
        ClientRequest::InitializeRequest(req) => {
            ServerResult::InitializeResult(server_info(&req.params.protocol_version))
        }
        ClientRequest::PingRequest(_) => ServerResult::empty(()),
        ClientRequest::ListToolsRequest(_) => {
            ServerResult::ListToolsResult(ListToolsResult::with_all_items(tools.tools()))
        }
        ClientRequest::ListResourcesRequest(_) => {
            ServerResult::ListResourcesResult(ListResourcesResult::default())
        }
        ClientRequest::ListPromptsRequest(_) => {
            ServerResult::ListPromptsResult(ListPromptsResult::default())
        }
        ClientRequest::CallToolRequest(req) => {
            return spawn_tool_call(tools, tx, calls, id, req.params);
        }
        ClientRequest::CustomRequest(req) => {
            return deliver(tx, ServerJsonRpcMessage::error(reject_custom(&req), id));
        }
        other => {
            let method = other.method().to_string();
            return deliver(tx, ServerJsonRpcMessage::error(method_not_found(&method), id));
        }
    };
    deliver(tx, ServerJsonRpcMessage::response(result, id))
}

fn reject_custom(req: &CustomRequest) -> ErrorData {
    if SERVED_METHODS.contains(&req.method.as_str()) {
        ErrorData::invalid_params(format!("invalid params for {}", req.method), None)
    } else {
        method_not_found(&req.method)
    }
}

fn method_not_found(method: &str) -> ErrorData {
    ErrorData::new(
        ErrorCode::METHOD_NOT_FOUND,
        format!("method not found: {method}"),
        None,
    )
}

fn spawn_tool_call(
    tools: &Arc<ToolTable>,
    tx: &Outbox,
    calls: &mut JoinSet<Result<()>>,
    id: RequestId,
    params: CallToolRequestParams,
) -> Result<()> {
    let name = params.name.to_string();
    let Some(handler) = tools.handler(&name) else {
        let unknown = ErrorData::invalid_params(format!("unknown tool: {name}"), None);
        return deliver(tx, ServerJsonRpcMessage::error(unknown, id));
    };

    let arguments = Value::Object(params.arguments.unwrap_or_default());
    let tx = tx.clone();
    let span = info_span!("tools/call", tool = %name, id = %id);
    calls.spawn(
        async move {
            let reply = match handler.call(arguments).await {
                Ok(result) => {
                    if result.is_error == Some(true) {
                        info!("tool returned an error result");
                    } else {
                        debug!("tool call completed");
                    }
                    ServerJsonRpcMessage::response(ServerResult::CallToolResult(result), id)
                }
                Err(AdapterError::Validation(e)) => {
                    warn!(error = %e, "rejected tool arguments");
                    let invalid = ErrorData::invalid_params(e.message.clone(), Some(e.data()));
                    ServerJsonRpcMessage::error(invalid, id)
                }
                Err(e) => {
                    error!(error = %e, "tool call failed");
                    return Err(e);
                }
            };
            deliver(&tx, reply)
        }
        .instrument(span),
    );
    Ok(())
}

/// Agree on the client's protocol version when supported, otherwise offer the latest.
fn negotiate(requested: &ProtocolVersion) -> ProtocolVersion {
    if SUPPORTED_PROTOCOL_VERSIONS.contains(requested) {
        requested.clone()
    } else {
        ProtocolVersion::LATEST
    }
}

fn server_info(requested: &ProtocolVersion) -> InitializeResult {
    InitializeResult {
        protocol_version: negotiate(requested),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            title: None,
            version: SERVER_VERSION.to_string(),
            description: None,
            icons: None,
            website_url: None,
        },
        instructions: None,
    }
}
