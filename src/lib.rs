//! A minimal MCP tool server.
//!
//! Tools are registered once into a [`ToolRegistry`], wrapped in a
//! [`ToolPipeline`] (lookup, schema validation, handler, result formatting)
//! and served over a newline-delimited JSON-RPC [`Transport`] by
//! [`McpServer`]. The bundled `get weather` tool geocodes a city and fetches
//! its forecast from Open-Meteo.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod tools;
pub mod transport;
pub mod types;
pub mod weather;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{spawn_server, McpClient};
pub use config::{ServerConfig, WeatherConfig};
pub use error::{ClientError, FramingError, NetworkError, NotFoundError, RegistryError, ToolError};
pub use format::format_outcome;
pub use schema::{Param, ParamKind, ParameterSchema, Refinement, ValidationError, Violation};
pub use server::{CloseReason, McpServer, Session, SessionState};
pub use tools::{ToolDef, ToolHandler, ToolPipeline, ToolRegistry};
pub use transport::{stdio, LineTransport, Transport};
pub use types::{
    ContentBlock, ForecastData, GeoLocation, ToolCallRequest, ToolDescriptor, ToolResult,
    ValidatedArgs,
};
pub use weather::{weather_tool, OpenMeteoClient, WeatherApi, GET_WEATHER};

/// Registry holding every tool this server ships with.
pub fn default_registry(api: impl WeatherApi + 'static) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new().with(weather_tool(api))
}
