//! Tool capability traits: the abstraction over everything the agent can call.
//!
//! Two layers live here:
//! - [`ToolProvider`]: an external service exposing a catalog of tools and a
//!   single call entry point (mail, calendar, messaging, files, search...).
//! - [`Tool`] + [`ToolRegistry`]: in-process tools. A registry can be served
//!   to the router as a provider, and executes leaked tool calls directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::model::ToolDefinition;

/// A tool as advertised by its provider. Read-only snapshot from discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Bare tool name as the provider knows it
    pub name: String,

    /// Description sent to the model
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,

    /// Id of the provider that owns the tool
    pub provider_id: String,
}

impl ToolDescriptor {
    /// Convert into the shape sent to the language model.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// The structured result of a tool call.
///
/// Provider failures are carried here (`success == false`) rather than thrown,
/// so one failing tool never aborts the orchestration loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Result payload on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Render the outcome as text for a tool-result message.
    pub fn render(&self) -> String {
        match (&self.result, &self.error) {
            (_, Some(err)) if !self.success => format!("Error: {err}"),
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            _ => String::new(),
        }
    }
}

/// An external capability source.
///
/// Providers are heterogeneous (each wraps a different backend) and share no
/// base type; this three-method interface is all the router relies on.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable identifier, used as the namespace prefix on collisions.
    fn id(&self) -> &str;

    /// Human-readable label used to annotate prefixed descriptions.
    fn label(&self) -> &str {
        self.id()
    }

    /// Whether the provider is currently usable. Unavailable providers are
    /// skipped during discovery and their tools vanish from the catalog.
    fn is_available(&self) -> bool;

    /// List the tools this provider currently exposes.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    /// Invoke a tool by its original (unprefixed) name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutcome, ToolError>;

    /// Whether the provider can be reached right now.
    async fn health_check(&self) -> bool {
        self.is_available()
    }
}

/// Anything that can execute a tool by name.
///
/// Used by leaked tool-call recovery so the repaired call goes through the
/// same execution path as a structured call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Whether a tool with this exact name can be executed.
    fn has_tool(&self, name: &str) -> bool;

    async fn execute_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutcome, ToolError>;
}

/// An in-process tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_job").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutcome, ToolError>;

    /// Describe this tool as owned by `provider_id`.
    fn to_descriptor(&self, provider_id: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
            provider_id: provider_id.to_string(),
        }
    }
}

/// A registry of in-process tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Describe every registered tool, sorted by name.
    pub fn descriptors(&self, provider_id: &str) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self
            .tools
            .values()
            .map(|t| t.to_descriptor(provider_id))
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    async fn execute_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutcome, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }
}
