//! In-process tools served as a provider.

use async_trait::async_trait;
use switchyard_core::error::ToolError;
use switchyard_core::tool::{Tool, ToolDescriptor, ToolExecutor, ToolOutcome, ToolProvider, ToolRegistry};

/// Exposes a [`ToolRegistry`] to the router so built-in tools are
/// discovered and namespaced like any external provider.
pub struct LocalToolProvider {
    id: String,
    label: String,
    registry: ToolRegistry,
}

impl LocalToolProvider {
    pub fn new(id: impl Into<String>, registry: ToolRegistry) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            registry,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a tool after construction.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.registry.register(tool);
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self.registry.descriptors(&self.id))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, ToolError> {
        self.registry.execute_tool(name, arguments).await
    }
}
