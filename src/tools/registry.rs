use crate::error::RegistryError;
use crate::types::ToolDescriptor;

use super::handler::ToolDef;

/// Catalog of available tools. Built once at startup, read-only afterwards.
/// Keeps registration order so `tools/list` is stable.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A name that is already taken is rejected and the
    /// existing registration is left in place.
    pub fn register(&mut self, tool: ToolDef) -> Result<(), RegistryError> {
        if self.lookup(&tool.name).is_some() {
            return Err(RegistryError::DuplicateTool(tool.name));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, tool: ToolDef) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Descriptors for capability discovery, in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(ToolDef::descriptor).collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
