//! Language model trait, the boundary to the model that drives the agent.
//!
//! The model itself is an external collaborator. The orchestrator only needs
//! a single request/response call that may return tool calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// A request to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call in this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The exposed tool name (possibly namespace-prefixed)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated message (text and/or tool calls)
    pub message: Message,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The language model driving the agent.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> std::result::Result<ModelResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_request_default_temperature() {
        let json = serde_json::json!({
            "model": "gpt-4o",
            "messages": [],
        });
        let req: ModelRequest = serde_json::from_value(json).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
    }
}
