use std::time::Duration;

use crate::schema::ValidationError;

/// Session-ending failure: the byte stream can no longer be trusted.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Startup-time registration failure.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
}

/// A lookup that completed but matched nothing. Rendered as informative
/// content, not as a failed call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {query} not found.")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub query: String,
}

impl NotFoundError {
    pub fn city(name: impl Into<String>) -> Self {
        Self {
            entity: "City",
            query: name.into(),
        }
    }
}

/// Outbound HTTP failure. Never retried by the adapter.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("{service} request timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },
    #[error("{service} request failed: {reason}")]
    Request { service: &'static str, reason: String },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to parse {service} response: {reason}")]
    Parse { service: &'static str, reason: String },
}

/// Everything that can go wrong between lookup and handler return.
/// The result formatter turns each variant into content.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// `input` names what the call was serving, when the caller knows it.
    #[error("{source}")]
    Network {
        source: NetworkError,
        input: Option<String>,
    },
}

impl From<NetworkError> for ToolError {
    fn from(source: NetworkError) -> Self {
        Self::Network {
            source,
            input: None,
        }
    }
}

impl ToolError {
    /// Attach the tool input a network failure was serving. Other variants
    /// already carry what they need.
    pub fn for_input(self, input: &str) -> Self {
        match self {
            Self::Network { source, .. } => Self::Network {
                source,
                input: Some(input.to_string()),
            },
            other => other,
        }
    }
}

/// Client-side failures when driving a tool server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] FramingError),
    #[error("server closed the connection")]
    Closed,
    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("expected response to request {expected}, got {actual}")]
    UnexpectedId { expected: u64, actual: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to spawn server: {0}")]
    Spawn(String),
}
