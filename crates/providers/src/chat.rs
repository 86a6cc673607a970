//! OpenAI-compatible chat completions as a [`LanguageModel`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use switchyard_config::AgentConfig;
use switchyard_core::error::ProviderError;
use switchyard_core::message::{Message, MessageToolCall, Role};
use switchyard_core::model::{LanguageModel, ModelRequest, ModelResponse, ToolDefinition};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest function name the API accepts.
const MAX_FUNCTION_NAME: usize = 64;

pub struct OpenAiChat {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiChat {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[agent]` section. Fails without an API key.
    pub fn from_config(config: &AgentConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("agent.api_key (or OPENAI_API_KEY) is not set".into())
        })?;
        Self::new("openai", &config.api_url, api_key)
    }

    fn request_body(request: &ModelRequest, names: &WireNames) -> serde_json::Value {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage::from_message(m, names))
            .collect();
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(
                request
                    .tools
                    .iter()
                    .map(|t| ApiToolDefinition::from_tool(t, names))
                    .collect::<Vec<_>>()
            );
        }
        body
    }
}

/// Per-request mapping between tool names and API function names.
///
/// Function names must match `^[a-zA-Z0-9_-]{1,64}$`, so namespaced tools
/// such as `mail.send` go out as `mail__send` and are mapped back when the
/// model calls them.
#[derive(Debug, Default)]
struct WireNames {
    to_wire: HashMap<String, String>,
    from_wire: HashMap<String, String>,
}

impl WireNames {
    fn for_tools(tools: &[ToolDefinition]) -> Self {
        let mut names = Self::default();
        let mut taken = HashSet::new();
        for tool in tools {
            if names.to_wire.contains_key(&tool.name) {
                continue;
            }
            let base = sanitize_function_name(&tool.name);
            let mut wire = base.clone();
            let mut n = 2;
            while !taken.insert(wire.clone()) {
                let suffix = format!("_{n}");
                let keep = MAX_FUNCTION_NAME.saturating_sub(suffix.len()).min(base.len());
                wire = format!("{}{suffix}", &base[..keep]);
                n += 1;
            }
            names.from_wire.insert(wire.clone(), tool.name.clone());
            names.to_wire.insert(tool.name.clone(), wire);
        }
        names
    }

    fn wire(&self, name: &str) -> String {
        self.to_wire
            .get(name)
            .cloned()
            .unwrap_or_else(|| sanitize_function_name(name))
    }

    fn original(&self, wire: &str) -> String {
        self.from_wire
            .get(wire)
            .cloned()
            .unwrap_or_else(|| wire.to_string())
    }
}

/// ASCII-only, so byte slicing stays on char boundaries.
fn sanitize_function_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => out.push(c),
            '.' => out.push_str("__"),
            _ => out.push('_'),
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out.truncate(MAX_FUNCTION_NAME);
    out
}

/// Map a non-200 status onto a provider error.
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn into_response(api: ApiResponse, names: &WireNames) -> Result<ModelResponse, ProviderError> {
    let choice = api.choices.into_iter().next().ok_or_else(|| ProviderError::ApiError {
        status_code: 200,
        message: "No choices in response".into(),
    })?;

    let mut message = Message::assistant(choice.message.content.unwrap_or_default());
    message.tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            name: names.original(&tc.function.name),
            arguments: tc.function.arguments,
        })
        .collect();

    Ok(ModelResponse {
        message,
        model: api.model,
    })
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let names = WireNames::for_tools(&request.tools);
        debug!(provider = %self.name, model = %request.model, tools = request.tools.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(&request, &names))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Chat endpoint returned error");
            return Err(status_error(status, body));
        }

        let api: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;
        into_response(api, &names)
    }
}

// --- Wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn from_message(m: &Message, names: &WireNames) -> Self {
        let role = match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        };
        let tool_calls = (!m.tool_calls.is_empty()).then(|| {
            m.tool_calls
                .iter()
                .map(|tc| ApiToolCall {
                    id: tc.id.clone(),
                    r#type: "function".into(),
                    function: ApiFunction {
                        name: names.wire(&tc.name),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        });
        Self {
            role: role.into(),
            content: Some(m.content.clone()),
            tool_calls,
            tool_call_id: m.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: &'static str,
    function: ApiToolFunction,
}

impl ApiToolDefinition {
    fn from_tool(t: &ToolDefinition, names: &WireNames) -> Self {
        Self {
            r#type: "function",
            function: ApiToolFunction {
                name: names.wire(&t.name),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_includes_tools_and_tool_results() {
        let mut assistant = Message::assistant("");
        assistant.tool_calls.push(MessageToolCall {
            id: "call_1".into(),
            name: "mail.send".into(),
            arguments: "{\"to\":\"dana\"}".into(),
        });
        let request = ModelRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                Message::user("email dana"),
                assistant,
                Message::tool_result("call_1", "sent"),
            ],
            temperature: 0.2,
            max_tokens: None,
            tools: vec![ToolDefinition {
                name: "mail.send".into(),
                description: "[Mail] Send an email".into(),
                parameters: json!({"type": "object"}),
            }],
        };

        let names = WireNames::for_tools(&request.tools);
        let body = OpenAiChat::request_body(&request, &names);
        assert_eq!(body["tools"][0]["function"]["name"], "mail__send");
        assert_eq!(body["tools"][0]["function"]["description"], "[Mail] Send an email");
        assert_eq!(body["messages"][1]["tool_calls"][0]["type"], "function");
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["name"], "mail__send");
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn response_with_tool_calls_is_parsed() {
        let api: ApiResponse = serde_json::from_value(json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "calendar__create", "arguments": "{}"}
                    }]
                }
            }]
        }))
        .unwrap();

        let names = WireNames::for_tools(&[ToolDefinition {
            name: "calendar.create".into(),
            description: "Create an event".into(),
            parameters: json!({"type": "object"}),
        }]);
        let response = into_response(api, &names).unwrap();
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls[0].name, "calendar.create");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let api: ApiResponse = serde_json::from_value(json!({"model": "m", "choices": []})).unwrap();
        assert!(into_response(api, &WireNames::default()).is_err());
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: String::new(),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn function_names_are_valid_and_unique() {
        let tools = [
            tool("mail.send"),
            tool("mail__send"),
            tool("search"),
            tool("web search/v2"),
            tool(&format!("{}.lookup", "x".repeat(70))),
        ];
        let names = WireNames::for_tools(&tools);

        let mut seen = HashSet::new();
        for t in &tools {
            let wire = names.wire(&t.name);
            assert!(wire.len() <= MAX_FUNCTION_NAME, "{wire}");
            assert!(
                wire.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "{wire}"
            );
            assert!(seen.insert(wire.clone()), "duplicate {wire}");
            assert_eq!(names.original(&wire), t.name);
        }
        assert_eq!(names.wire("search"), "search");
        assert_eq!(names.wire("mail.send"), "mail__send");
        assert_eq!(names.wire("mail__send"), "mail__send_2");
    }

    #[test]
    fn unknown_function_name_passes_through() {
        let names = WireNames::for_tools(&[tool("mail.send")]);
        assert_eq!(names.original("something_else"), "something_else");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error(429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(status_error(401, String::new()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(
            status_error(502, "bad gateway".into()),
            ProviderError::ApiError { status_code: 502, .. }
        ));
    }

    #[test]
    fn from_config_requires_key() {
        let config = AgentConfig::default();
        assert!(matches!(
            OpenAiChat::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        let config = AgentConfig {
            api_key: Some("sk-live".into()),
            ..AgentConfig::default()
        };
        let chat = OpenAiChat::from_config(&config).unwrap();
        assert_eq!(chat.name(), "openai");
        assert!(!format!("{chat:?}").contains("sk-live"));
    }
}
