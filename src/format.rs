//! Turns a handler outcome into the content-block shape the protocol carries.
//!
//! Every path out of here yields exactly one text block, so a `ToolResult`
//! is never empty no matter how the call went.

use crate::error::ToolError;
use crate::types::ToolResult;

/// Wrap a handler outcome. Success payloads pass through verbatim.
pub fn format_outcome(outcome: Result<String, ToolError>) -> ToolResult {
    match outcome {
        Ok(payload) if payload.is_empty() => ToolResult::text("(no output)"),
        Ok(payload) => ToolResult::text(payload),
        Err(e) => format_error(&e),
    }
}

/// A not-found outcome is a completed lookup, so it is not flagged as an error.
pub fn format_error(error: &ToolError) -> ToolResult {
    match error {
        ToolError::NotFound(e) => ToolResult::text(e.to_string()),
        ToolError::UnknownTool(name) => ToolResult::error(format!("Unknown tool: {name}")),
        ToolError::Validation(e) => ToolResult::error(format!("Validation error: {e}")),
        ToolError::Network {
            source,
            input: Some(input),
        } => ToolResult::error(format!("Network error: {source} (input: {input:?})")),
        ToolError::Network { source, .. } => ToolResult::error(format!("Network error: {source}")),
    }
}
