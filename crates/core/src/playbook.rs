//! Playbook store boundary.
//!
//! The store persists playbooks ("skills") created by users or synced from
//! skill bundles on disk. The storage engine itself is external.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::PlaybookError;

/// A playbook as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    /// Positive store-assigned id
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub instructions: String,

    /// Trigger keywords; empty means catalog-only
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub required_tools: Vec<String>,

    /// "keyword", "schedule", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Fields for registering a new playbook in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub keywords: Vec<String>,
    pub priority: i32,
    pub required_tools: Vec<String>,
    pub trigger_type: Option<String>,
    pub trigger_config: Option<serde_json::Value>,
    pub max_steps: Option<u32>,
    pub execution_plan: Option<serde_json::Value>,
    pub agent_id: Option<String>,
}

/// Persistent playbook storage.
#[async_trait]
pub trait PlaybookStore: Send + Sync {
    /// List playbooks, optionally filtered by agent and trigger type.
    async fn list_skills(
        &self,
        agent_id: Option<&str>,
        trigger_type: Option<&str>,
        enabled_only: bool,
    ) -> std::result::Result<Vec<SkillRecord>, PlaybookError>;

    /// Persist a new playbook, returning its id.
    async fn store_skill(&self, skill: NewSkill) -> std::result::Result<i64, PlaybookError>;
}
