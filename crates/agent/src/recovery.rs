//! Repair of tool calls the model wrote into its reply as plain JSON instead
//! of emitting a structured call.
//!
//! Only a single top-level `{"name": ..., "parameters": {...}}` object is
//! recognised, and only when `name` is a tool that actually exists.

use serde_json::Value;
use switchyard_core::tool::{ToolExecutor, ToolOutcome};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LeakedToolCall {
    pub tool_name: String,
    pub parameters: Value,
    /// Conversational text preceding the JSON, trimmed
    pub preamble: String,
}

/// Byte offsets of every `{` that opens something shaped like `{ "name":`.
fn object_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices('{').filter_map(|(start, _)| {
        let rest = text[start + 1..].trim_start().strip_prefix("\"name\"")?;
        rest.trim_start().starts_with(':').then_some(start)
    })
}

/// Find a leaked call to one of `available` tools in `text`.
pub fn detect_leaked_tool_call(text: &str, available: &[String]) -> Option<LeakedToolCall> {
    for start in object_starts(text) {
        let Some(Ok(value)) = serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
        else {
            continue;
        };

        let Some(name) = value.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !available.iter().any(|tool| tool == name) {
            continue;
        }
        let Some(parameters) = value.get("parameters").filter(|p| p.is_object()) else {
            continue;
        };

        return Some(LeakedToolCall {
            tool_name: name.to_string(),
            parameters: parameters.clone(),
            preamble: preamble(&text[..start]),
        });
    }
    None
}

fn preamble(before: &str) -> String {
    let trimmed = before.trim_end();
    let trimmed = trimmed
        .strip_suffix("```json")
        .or_else(|| trimmed.strip_suffix("```"))
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Execute a recovered call through the normal tool path. Errors are folded
/// into a failed outcome.
pub async fn recover_leaked_tool_call(
    tool_name: &str,
    parameters: Value,
    tools: &dyn ToolExecutor,
) -> ToolOutcome {
    match tools.execute_tool(tool_name, parameters).await {
        Ok(outcome) => {
            info!(tool = %tool_name, success = outcome.success, "Recovered leaked tool call");
            outcome
        }
        Err(e) => {
            warn!(tool = %tool_name, error = %e, "Leaked tool call recovery failed");
            ToolOutcome::failure(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use switchyard_core::error::ToolError;

    fn tools(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn detects_call_with_preamble() {
        let text = "I'll do it.\n{\"name\":\"create_job\",\"parameters\":{\"type\":\"scheduled\"}}";
        let leaked = detect_leaked_tool_call(text, &tools(&["create_job"])).unwrap();
        assert_eq!(leaked.tool_name, "create_job");
        assert_eq!(leaked.parameters, json!({"type": "scheduled"}));
        assert_eq!(leaked.preamble, "I'll do it.");
    }

    #[test]
    fn strips_code_fence_from_preamble() {
        let text = "Sure thing:\n```json\n{ \"name\": \"send_email\", \"parameters\": {\"to\": \"a@b.c\"} }\n```";
        let leaked = detect_leaked_tool_call(text, &tools(&["send_email"])).unwrap();
        assert_eq!(leaked.preamble, "Sure thing:");
        assert_eq!(leaked.parameters["to"], "a@b.c");
    }

    #[test]
    fn unknown_tool_names_are_ignored() {
        let text = r#"Here is your data: {"name": "Alice", "parameters": {"age": 30}}"#;
        assert!(detect_leaked_tool_call(text, &tools(&["send_email"])).is_none());
    }

    #[test]
    fn requires_object_parameters() {
        let text = r#"{"name": "create_job", "parameters": "scheduled"}"#;
        assert!(detect_leaked_tool_call(text, &tools(&["create_job"])).is_none());
    }

    #[test]
    fn malformed_json_is_skipped() {
        let text = r#"{"name": "create_job", "parameters": {"type": } oops"#;
        assert!(detect_leaked_tool_call(text, &tools(&["create_job"])).is_none());
        assert!(detect_leaked_tool_call("no json here", &tools(&["create_job"])).is_none());
    }

    #[test]
    fn later_valid_object_is_found() {
        let text = r#"{"name": "Bob"} then {"name": "create_job", "parameters": {}}"#;
        let leaked = detect_leaked_tool_call(text, &tools(&["create_job"])).unwrap();
        assert_eq!(leaked.preamble, r#"{"name": "Bob"} then"#);
    }

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        fn has_tool(&self, name: &str) -> bool {
            name == "echo"
        }

        async fn execute_tool(&self, name: &str, arguments: Value) -> Result<ToolOutcome, ToolError> {
            if name == "echo" {
                Ok(ToolOutcome::ok(arguments))
            } else {
                Err(ToolError::NotFound(name.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn recovery_executes_through_executor() {
        let outcome = recover_leaked_tool_call("echo", json!({"x": 1}), &Echo).await;
        assert!(outcome.success);
        assert_eq!(outcome.result, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn recovery_captures_errors() {
        let outcome = recover_leaked_tool_call("missing", json!({}), &Echo).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("missing"));
    }
}
