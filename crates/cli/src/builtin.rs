//! Tools the CLI serves in-process.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use switchyard_core::error::ToolError;
use switchyard_core::tool::{Tool, ToolOutcome, ToolRegistry};
use switchyard_router::LocalToolProvider;

pub const PROVIDER_ID: &str = "builtin";

struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Current date and time in UTC"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolOutcome, ToolError> {
        let now = Utc::now();
        Ok(ToolOutcome::ok(json!({
            "utc": now.to_rfc3339(),
            "unix": now.timestamp(),
        })))
    }
}

pub fn provider() -> LocalToolProvider {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CurrentTime));
    LocalToolProvider::new(PROVIDER_ID, registry).with_label("Built-in")
}
