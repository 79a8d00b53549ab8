//! The session loop: one transport, one request in flight at a time.
//!
//! ```text
//! Idle -> AwaitingRequest -> Dispatching -> AwaitingHandler -> Responding -> AwaitingRequest
//!                 \-> Closed (stream ended, cancelled, or framing failed)
//! ```
//!
//! Only framing problems end a session. Everything a tool can get wrong comes
//! back to the client as result content.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ServerConfig;
use crate::error::FramingError;
use crate::protocol::{
    self, method, Implementation, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::ToolPipeline;
use crate::transport::Transport;
use crate::types::ToolCallRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingRequest,
    Dispatching,
    AwaitingHandler,
    Responding,
    Closed,
}

/// How a session ended without a framing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    EndOfStream,
    Cancelled,
}

/// Holds the read-only tool pipeline and serves sessions against it.
pub struct McpServer {
    info: Implementation,
    tools: ToolPipeline,
}

impl McpServer {
    pub fn new(config: &ServerConfig, tools: ToolPipeline) -> Self {
        Self {
            info: Implementation {
                name: config.name.clone(),
                version: config.version.clone(),
            },
            tools,
        }
    }

    pub fn tools(&self) -> &ToolPipeline {
        &self.tools
    }

    /// Serve until the peer closes the stream.
    pub async fn serve<T: Transport>(&self, transport: T) -> Result<CloseReason, FramingError> {
        self.serve_with_cancel(transport, CancellationToken::new())
            .await
    }

    /// Serve until the stream closes or `cancel` fires. Cancellation is only
    /// observed while waiting for the next request; a call already in flight
    /// is answered first.
    pub async fn serve_with_cancel<T: Transport>(
        &self,
        transport: T,
        cancel: CancellationToken,
    ) -> Result<CloseReason, FramingError> {
        Session::new(self, transport).run(cancel).await
    }

    /// Turn one decoded request into its response. `None` for notifications.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id,
            method: rpc_method,
            params,
            ..
        } = request;

        let Some(id) = id else {
            match rpc_method.as_str() {
                method::INITIALIZED => info!("client initialized"),
                other => debug!(method = other, "ignoring notification"),
            }
            return None;
        };

        let response = match rpc_method.as_str() {
            method::INITIALIZE => {
                if let Some(client) = params.get("clientInfo") {
                    info!(client = %client, "initialize");
                }
                to_result(id, &InitializeResult::new(self.info.clone()))
            }
            method::PING => JsonRpcResponse::success(id, json!({})),
            method::TOOLS_LIST => to_result(
                id,
                &ListToolsResult {
                    tools: self.tools.list(),
                },
            ),
            method::TOOLS_CALL => match serde_json::from_value::<ToolCallRequest>(params) {
                Ok(call) => {
                    let result = self.tools.execute(call).await;
                    to_result(id, &result)
                }
                Err(e) => JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params for tools/call: {e}"),
                ),
            },
            other => {
                warn!(method = other, "method not found");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
            }
        };

        Some(response)
    }
}

fn to_result<T: serde::Serialize>(id: Value, body: &T) -> JsonRpcResponse {
    match serde_json::to_value(body) {
        Ok(v) => JsonRpcResponse::success(id, v),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Internal error: {e}")),
    }
}

/// One client connection's loop state.
pub struct Session<'a, T> {
    server: &'a McpServer,
    transport: T,
    state: SessionState,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(server: &'a McpServer, transport: T) -> Self {
        Self {
            server,
            transport,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        trace!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    pub async fn run(mut self, cancel: CancellationToken) -> Result<CloseReason, FramingError> {
        info!(server = %self.server.info.name, tools = self.server.tools.len(), "session started");
        let outcome = self.run_loop(&cancel).await;
        self.transition(SessionState::Closed);

        match &outcome {
            Ok(reason) => info!(?reason, "session closed"),
            Err(e) => warn!(error = %e, "session ended on framing error"),
        }
        outcome
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<CloseReason, FramingError> {
        loop {
            self.transition(SessionState::AwaitingRequest);
            let frame = tokio::select! {
                frame = self.transport.recv() => frame,
                _ = cancel.cancelled() => return Ok(CloseReason::Cancelled),
            };
            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(CloseReason::EndOfStream),
                Err(e) => return Err(self.reject(e).await),
            };

            self.transition(SessionState::Dispatching);
            let request = match protocol::decode_request(&frame) {
                Ok(request) => request,
                Err(e) => return Err(self.reject(e).await),
            };

            debug!(method = %request.method, id = ?request.id, "request");
            self.transition(SessionState::AwaitingHandler);
            let Some(response) = self.server.handle(request).await else {
                continue;
            };

            self.transition(SessionState::Responding);
            let line = protocol::encode(&response)?;
            self.transport.send(&line).await?;
        }
    }

    /// Best effort: tell the peer why before hanging up. A broken pipe gets
    /// no reply.
    async fn reject(&mut self, error: FramingError) -> FramingError {
        if matches!(error, FramingError::Io(_)) {
            return error;
        }
        let reply = JsonRpcResponse::error(Value::Null, PARSE_ERROR, error.to_string());
        if let Ok(line) = protocol::encode(&reply) {
            let _ = self.transport.send(&line).await;
        }
        error
    }
}
