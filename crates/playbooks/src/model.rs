//! The cached playbook shape shared by store-backed and file-backed skills.

use serde::{Deserialize, Serialize};
use switchyard_core::playbook::SkillRecord;

/// Where a playbook was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybookSource {
    Database,
    File,
}

/// A playbook ready for classification and prompting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPlaybook {
    /// Positive for store-backed playbooks, negative for file-backed ones
    pub id: i64,
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Lowercased trigger keywords
    pub keywords: Vec<String>,
    pub priority: i32,
    /// Tools forced into scope when this playbook matches
    pub required_tools: Vec<String>,
    pub source: PlaybookSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<serde_json::Value>,
}

impl CachedPlaybook {
    /// Whether the classifier can match this playbook at all.
    pub fn is_classifiable(&self) -> bool {
        !self.keywords.is_empty()
    }

    pub fn is_schedulable(&self) -> bool {
        self.trigger_config.is_some()
    }
}

/// Lowercase, trim and dedupe keywords, dropping empty ones.
pub(crate) fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}

/// Adapt a store record into a classifier-eligible playbook.
///
/// Returns `None` when the record has no keywords; such records are still
/// listed in the catalog via [`catalog_entry`].
pub fn parse_skill_to_playbook(record: &SkillRecord) -> Option<CachedPlaybook> {
    let playbook = catalog_entry(record);
    playbook.is_classifiable().then_some(playbook)
}

/// Adapt a store record regardless of keywords.
pub fn catalog_entry(record: &SkillRecord) -> CachedPlaybook {
    CachedPlaybook {
        id: record.id,
        name: record.name.clone(),
        description: record.description.clone(),
        instructions: record.instructions.clone(),
        keywords: normalize_keywords(&record.keywords),
        priority: record.priority,
        required_tools: record.required_tools.clone(),
        source: PlaybookSource::Database,
        trigger_config: record.trigger_config.clone(),
        max_steps: record.max_steps,
        execution_plan: record.execution_plan.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(keywords: &[&str]) -> SkillRecord {
        SkillRecord {
            id: 12,
            name: "expense-report".into(),
            description: "File an expense report".into(),
            instructions: "Collect receipts, then submit.".into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority: 3,
            required_tools: vec!["files.upload".into()],
            trigger_type: Some("keyword".into()),
            trigger_config: None,
            max_steps: None,
            execution_plan: None,
            agent_id: None,
            enabled: true,
        }
    }

    #[test]
    fn record_with_keywords_is_classifiable() {
        let playbook = parse_skill_to_playbook(&record(&["Expense", " Receipt ", "expense"])).unwrap();
        assert_eq!(playbook.keywords, vec!["expense", "receipt"]);
        assert_eq!(playbook.source, PlaybookSource::Database);
        assert_eq!(playbook.id, 12);
    }

    #[test]
    fn record_without_keywords_is_catalog_only() {
        let r = record(&[]);
        assert!(parse_skill_to_playbook(&r).is_none());
        assert!(!catalog_entry(&r).is_classifiable());

        let blank = record(&["  "]);
        assert!(parse_skill_to_playbook(&blank).is_none());
    }
}
