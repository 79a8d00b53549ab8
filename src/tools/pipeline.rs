use std::time::Instant;

use tracing::{debug, info, warn};

use super::registry::ToolRegistry;
use crate::error::ToolError;
use crate::format::{format_error, format_outcome};
use crate::types::{ToolCallRequest, ToolDescriptor, ToolResult};

/// Executes a tool call end to end: lookup, validation, handler, formatting.
///
/// Nothing below this point escapes as an error. Unknown tools, invalid
/// arguments and handler failures all come back as content.
pub struct ToolPipeline {
    registry: ToolRegistry,
}

impl ToolPipeline {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, request: ToolCallRequest) -> ToolResult {
        let ToolCallRequest { name, arguments } = request;

        let Some(tool) = self.registry.lookup(&name) else {
            warn!(tool = %name, "unknown tool");
            return format_error(&ToolError::UnknownTool(name));
        };

        let args = match tool.schema.validate(&arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %name, error = %e, "argument validation failed");
                return format_error(&ToolError::from(e));
            }
        };

        debug!(tool = %name, "invoking handler");
        let started = Instant::now();
        let outcome = tool.handler.call(args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(_) => info!(tool = %name, elapsed_ms, "tool call succeeded"),
            Err(ToolError::NotFound(e)) => info!(tool = %name, elapsed_ms, "{e}"),
            Err(e) => warn!(tool = %name, elapsed_ms, error = %e, "tool call failed"),
        }

        format_outcome(outcome)
    }

    /// Delegate to the registry for discovery.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.tool_names()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Param, ParameterSchema};
    use crate::tools::{ToolDef, ToolHandler};
    use crate::types::ValidatedArgs;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEcho {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ToolHandler for CountingEcho {
        async fn call(&self, args: ValidatedArgs) -> Result<String, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {}", args.get_str("message").unwrap_or_default()))
        }
    }

    fn pipeline() -> (ToolPipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new()
            .with(ToolDef::new(
                "echo",
                "Echoes a message",
                ParameterSchema::new().param(Param::string("message").non_empty()),
                CountingEcho {
                    calls: calls.clone(),
                },
            ))
            .unwrap();
        (ToolPipeline::new(registry), calls)
    }

    #[tokio::test]
    async fn valid_call_runs_handler_once() {
        let (pipeline, calls) = pipeline();
        let result = pipeline
            .execute(ToolCallRequest::new("echo", json!({"message": "hi"})))
            .await;

        assert_eq!(result.texts(), vec!["echo: hi"]);
        assert!(!result.is_error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_handler() {
        let (pipeline, calls) = pipeline();

        for args in [json!({}), json!({"message": 7}), json!({"message": ""}), json!("hi")] {
            let result = pipeline.execute(ToolCallRequest::new("echo", args)).await;
            assert!(result.is_error);
            assert_eq!(result.content.len(), 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_content() {
        let (pipeline, calls) = pipeline();
        let result = pipeline
            .execute(ToolCallRequest::new("get stock price", json!({})))
            .await;

        assert!(result.is_error);
        assert_eq!(result.texts(), vec!["Unknown tool: get stock price"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delegates_discovery() {
        let (pipeline, _) = pipeline();
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline.tool_names(), vec!["echo"]);
        assert_eq!(pipeline.list()[0].description, "Echoes a message");
    }
}
