use async_trait::async_trait;

use crate::error::ToolError;
use crate::schema::ParameterSchema;
use crate::types::{ToolDescriptor, ValidatedArgs};

/// A tool's execution handler. Only ever sees arguments that passed the
/// tool's schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ValidatedArgs) -> Result<String, ToolError>;
}

/// A registered tool: discovery metadata + handler for execution.
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
    pub(crate) handler: Box<dyn ToolHandler>,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ParameterSchema,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(handler),
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
