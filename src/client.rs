use std::process::Stdio;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{
    self, method, Implementation, InitializeResult, JsonRpcRequest, ListToolsResult,
    PROTOCOL_VERSION,
};
use crate::transport::{LineTransport, Transport};
use crate::types::{ToolDescriptor, ToolResult};

/// Drives a tool server over any [`Transport`]. Requests are sent one at a
/// time with increasing ids and each reply must carry the id it answers.
pub struct McpClient<T> {
    transport: T,
    next_id: u64,
}

pub type ChildTransport = LineTransport<BufReader<ChildStdout>, ChildStdin>;

impl<T: Transport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: 1,
        }
    }

    /// `initialize` followed by the `notifications/initialized` notification.
    pub async fn initialize(
        &mut self,
        client_info: Implementation,
    ) -> Result<InitializeResult, ClientError> {
        let result: InitializeResult = self
            .request(
                method::INITIALIZE,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "clientInfo": client_info,
                }),
            )
            .await?;
        self.notify(method::INITIALIZED, json!({})).await?;
        Ok(result)
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        let _: Value = self.request(method::PING, Value::Null).await?;
        Ok(())
    }

    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ClientError> {
        let result: ListToolsResult = self.request(method::TOOLS_LIST, Value::Null).await?;
        Ok(result.tools)
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ClientError> {
        self.request(
            method::TOOLS_CALL,
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), ClientError> {
        let line = protocol::encode(&JsonRpcRequest::notification(method, params))?;
        self.transport.send(&line).await?;
        Ok(())
    }

    async fn request<R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<R, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let line = protocol::encode(&JsonRpcRequest::new(id, method, params))?;
        debug!(id, method, "client request");
        self.transport.send(&line).await?;

        let frame = self.transport.recv().await?.ok_or(ClientError::Closed)?;
        let response = protocol::decode_response(&frame)?;

        if response.id != json!(id) {
            return Err(ClientError::UnexpectedId {
                expected: id,
                actual: response.id.to_string(),
            });
        }
        if let Some(err) = response.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Start a server process and talk to it over its stdin/stdout. The child is
/// killed when the returned handle is dropped.
pub fn spawn_server(
    command: &mut Command,
) -> Result<(Child, McpClient<ChildTransport>), ClientError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClientError::Spawn(e.to_string()))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ClientError::Spawn("child stdin not captured".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClientError::Spawn("child stdout not captured".into()))?;

    Ok((child, McpClient::new(LineTransport::new(stdout, stdin))))
}
