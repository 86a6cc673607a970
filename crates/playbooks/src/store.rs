//! In-memory playbook store, for tests and single-process deployments.

use async_trait::async_trait;
use switchyard_core::error::PlaybookError;
use switchyard_core::playbook::{NewSkill, PlaybookStore, SkillRecord};
use tokio::sync::RwLock;

/// A [`PlaybookStore`] backed by a vector. Ids start at 1.
///
/// Records without an `agent_id` are shared by every agent.
#[derive(Default)]
pub struct InMemoryPlaybookStore {
    skills: RwLock<Vec<SkillRecord>>,
}

impl InMemoryPlaybookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-built records.
    pub fn with_records(records: Vec<SkillRecord>) -> Self {
        Self {
            skills: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.skills.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.skills.read().await.is_empty()
    }

    /// Enable or disable every record named `name`. Returns whether any matched.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut skills = self.skills.write().await;
        let mut found = false;
        for skill in skills.iter_mut().filter(|s| s.name == name) {
            skill.enabled = enabled;
            found = true;
        }
        found
    }
}

#[async_trait]
impl PlaybookStore for InMemoryPlaybookStore {
    async fn list_skills(
        &self,
        agent_id: Option<&str>,
        trigger_type: Option<&str>,
        enabled_only: bool,
    ) -> Result<Vec<SkillRecord>, PlaybookError> {
        let skills = self.skills.read().await;
        Ok(skills
            .iter()
            .filter(|s| match (agent_id, s.agent_id.as_deref()) {
                (Some(wanted), Some(owner)) => wanted == owner,
                _ => true,
            })
            .filter(|s| trigger_type.is_none_or(|t| s.trigger_type.as_deref() == Some(t)))
            .filter(|s| !enabled_only || s.enabled)
            .cloned()
            .collect())
    }

    async fn store_skill(&self, skill: NewSkill) -> Result<i64, PlaybookError> {
        let mut skills = self.skills.write().await;
        if skills
            .iter()
            .any(|s| s.name == skill.name && s.agent_id == skill.agent_id)
        {
            return Err(PlaybookError::Store(format!(
                "playbook '{}' already exists",
                skill.name
            )));
        }

        let id = skills.iter().map(|s| s.id).max().unwrap_or(0).max(0) + 1;
        skills.push(SkillRecord {
            id,
            name: skill.name,
            description: skill.description,
            instructions: skill.instructions,
            keywords: skill.keywords,
            priority: skill.priority,
            required_tools: skill.required_tools,
            trigger_type: skill.trigger_type,
            trigger_config: skill.trigger_config,
            max_steps: skill.max_steps,
            execution_plan: skill.execution_plan,
            agent_id: skill.agent_id,
            enabled: true,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, agent: Option<&str>, trigger: Option<&str>) -> NewSkill {
        NewSkill {
            name: name.into(),
            agent_id: agent.map(String::from),
            trigger_type: trigger.map(String::from),
            ..NewSkill::default()
        }
    }

    #[tokio::test]
    async fn store_assigns_increasing_ids() {
        let store = InMemoryPlaybookStore::new();
        assert_eq!(store.store_skill(skill("a", None, None)).await.unwrap(), 1);
        assert_eq!(store.store_skill(skill("b", None, None)).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let store = InMemoryPlaybookStore::new();
        store.store_skill(skill("a", None, None)).await.unwrap();
        assert!(store.store_skill(skill("a", None, None)).await.is_err());
        assert!(store.store_skill(skill("a", Some("bot"), None)).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_by_agent_trigger_and_enabled() {
        let store = InMemoryPlaybookStore::new();
        store.store_skill(skill("shared", None, Some("keyword"))).await.unwrap();
        store.store_skill(skill("mine", Some("bot"), Some("schedule"))).await.unwrap();
        store.store_skill(skill("theirs", Some("other"), Some("keyword"))).await.unwrap();
        assert!(store.set_enabled("shared", false).await);
        assert!(!store.set_enabled("missing", false).await);

        let names = |records: Vec<SkillRecord>| records.into_iter().map(|r| r.name).collect::<Vec<_>>();

        assert_eq!(names(store.list_skills(Some("bot"), None, false).await.unwrap()), vec!["shared", "mine"]);
        assert_eq!(names(store.list_skills(Some("bot"), None, true).await.unwrap()), vec!["mine"]);
        assert_eq!(names(store.list_skills(None, Some("keyword"), false).await.unwrap()), vec!["shared", "theirs"]);
    }
}
