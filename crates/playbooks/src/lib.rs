//! Playbooks for Switchyard.
//!
//! A playbook (or "skill") is a named instruction set that is triggered by
//! keywords in a user message or by a schedule. Playbooks come from two
//! sources: the persistent playbook store, and `SKILL.md` bundles on disk.
//! The [`PlaybookCache`] merges both into one snapshot and keeps it fresh.

pub mod cache;
pub mod classifier;
pub mod loader;
pub mod model;
pub mod store;

pub use cache::{CacheStatus, PlaybookCache, PlaybookCacheOptions, RefreshReport};
pub use classifier::{classify_message, required_tools};
pub use loader::{SkillLoader, SkillScan, file_playbook_id};
pub use model::{CachedPlaybook, PlaybookSource, parse_skill_to_playbook};
pub use store::InMemoryPlaybookStore;
