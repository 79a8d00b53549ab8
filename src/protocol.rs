//! MCP's JSON-RPC 2.0 envelope: what goes on the wire, and the codec between
//! wire text and typed messages.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::FramingError;
use crate::types::{ToolDescriptor, ToolResult};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// An inbound request, or a notification when `id` is absent. An explicit
/// `"id": null` is still a request and is answered with `id: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

// Only called when the key is present, so `null` becomes `Some(Null)`.
fn present_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// `serverInfo` / `clientInfo` in the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: Implementation,
}

impl InitializeResult {
    pub fn new(server_info: Implementation) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: json!({ "tools": {} }),
            server_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// Parse one frame. Anything that is not a JSON-RPC 2.0 request object is a
/// framing error; the session can't trust the stream after that.
pub fn decode_request(frame: &str) -> Result<JsonRpcRequest, FramingError> {
    let request: JsonRpcRequest =
        serde_json::from_str(frame).map_err(|e| FramingError::Malformed(e.to_string()))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(FramingError::Malformed(format!(
            "unsupported jsonrpc version {:?}",
            request.jsonrpc
        )));
    }
    Ok(request)
}

pub fn decode_response(frame: &str) -> Result<JsonRpcResponse, FramingError> {
    serde_json::from_str(frame).map_err(|e| FramingError::Malformed(e.to_string()))
}

/// Serialize to a single line. serde_json escapes embedded newlines, so the
/// output never contains the frame delimiter.
pub fn encode<T: Serialize>(message: &T) -> Result<String, FramingError> {
    serde_json::to_string(message).map_err(|e| FramingError::Encode(e.to_string()))
}

pub fn tool_result_value(result: &ToolResult) -> Result<Value, FramingError> {
    serde_json::to_value(result).map_err(|e| FramingError::Encode(e.to_string()))
}
