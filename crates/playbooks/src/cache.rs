//! Playbook cache: one merged, periodically refreshed view of store-backed
//! and file-backed playbooks.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use switchyard_config::PlaybookConfig;
use switchyard_core::error::PlaybookError;
use switchyard_core::event::{DomainEvent, EventBus};
use switchyard_core::playbook::{NewSkill, PlaybookStore};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classifier::classify_message;
use crate::loader::SkillLoader;
use crate::model::{CachedPlaybook, catalog_entry};

/// Trigger type recorded for file skills registered with the store.
pub const SCHEDULE_TRIGGER: &str = "schedule";

#[derive(Debug, Clone)]
pub struct PlaybookCacheOptions {
    /// Age after which reads trigger a refresh
    pub staleness: Duration,
    /// Restrict store-backed playbooks (and auto-registration) to one agent
    pub agent_id: Option<String>,
}

impl Default for PlaybookCacheOptions {
    fn default() -> Self {
        Self::from_config(&PlaybookConfig::default())
    }
}

impl PlaybookCacheOptions {
    pub fn from_config(config: &PlaybookConfig) -> Self {
        Self {
            staleness: config.staleness(),
            agent_id: config.agent_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    /// Every known playbook, store-backed first then by priority
    catalog: Vec<CachedPlaybook>,
    refreshed_at: Option<Instant>,
}

impl Snapshot {
    fn classifiable(&self) -> Vec<CachedPlaybook> {
        self.catalog
            .iter()
            .filter(|p| p.is_classifiable())
            .cloned()
            .collect()
    }
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    /// Classifier-eligible playbooks
    pub playbooks: usize,
    /// All playbooks, including catalog-only ones
    pub catalog: usize,
    /// File skills newly registered with the store
    pub synced: Vec<String>,
    /// Skill bundles rejected during the scan
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub playbooks: usize,
    pub catalog: usize,
    pub age_secs: Option<u64>,
    pub stale: bool,
}

/// Merges the playbook store with file skills.
///
/// Reads go through an immutable snapshot; a refresh builds a new one and
/// swaps it in. A failed refresh leaves the previous snapshot in place.
pub struct PlaybookCache {
    store: Option<Arc<dyn PlaybookStore>>,
    loader: Option<SkillLoader>,
    options: PlaybookCacheOptions,
    snapshot: RwLock<Arc<Snapshot>>,
    refreshing: Mutex<()>,
    /// Completed refresh attempts, successful or not
    attempts: AtomicU64,
    invalidated: AtomicBool,
    events: Arc<EventBus>,
}

impl PlaybookCache {
    pub fn new(options: PlaybookCacheOptions) -> Self {
        Self {
            store: None,
            loader: None,
            options,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            refreshing: Mutex::new(()),
            attempts: AtomicU64::new(0),
            invalidated: AtomicBool::new(false),
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PlaybookStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_loader(mut self, loader: SkillLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Re-read both sources and publish a new snapshot.
    pub async fn refresh(&self) -> Result<RefreshReport, PlaybookError> {
        let _guard = self.refreshing.lock().await;
        self.refresh_locked().await
    }

    /// Caller holds `refreshing`.
    async fn refresh_locked(&self) -> Result<RefreshReport, PlaybookError> {
        let result = self.rebuild().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn rebuild(&self) -> Result<RefreshReport, PlaybookError> {
        let agent_id = self.options.agent_id.as_deref();

        // Disabled records still claim their name.
        let records = match &self.store {
            Some(store) => store.list_skills(agent_id, None, false).await?,
            None => Vec::new(),
        };
        let scan = match &self.loader {
            Some(loader) => loader.scan()?,
            None => Default::default(),
        };

        let mut report = RefreshReport {
            rejected: scan.errors.iter().map(|e| e.to_string()).collect(),
            ..RefreshReport::default()
        };

        let stored_names: HashSet<String> = records.iter().map(|r| r.name.clone()).collect();

        if let Some(store) = &self.store {
            for playbook in scan.playbooks.iter().filter(|p| p.is_schedulable()) {
                if stored_names.contains(&playbook.name) {
                    continue;
                }
                match store.store_skill(new_skill_from(playbook, agent_id)).await {
                    Ok(id) => {
                        info!(skill = %playbook.name, id, "Registered scheduled skill with store");
                        report.synced.push(playbook.name.clone());
                    }
                    Err(e) => warn!(skill = %playbook.name, error = %e, "Failed to register scheduled skill"),
                }
            }
        }

        let mut catalog: Vec<CachedPlaybook> = records
            .iter()
            .filter(|r| r.enabled)
            .map(catalog_entry)
            .collect();
        for playbook in scan.playbooks {
            if stored_names.contains(&playbook.name) {
                debug!(skill = %playbook.name, "Store-backed playbook shadows file skill");
                continue;
            }
            catalog.push(playbook);
        }
        catalog.sort_by(|a, b| b.priority.cmp(&a.priority));

        let snapshot = Snapshot {
            catalog,
            refreshed_at: Some(Instant::now()),
        };
        report.catalog = snapshot.catalog.len();
        report.playbooks = snapshot.catalog.iter().filter(|p| p.is_classifiable()).count();

        *self.snapshot.write().await = Arc::new(snapshot);
        self.invalidated.store(false, Ordering::SeqCst);

        info!(
            playbooks = report.playbooks,
            catalog = report.catalog,
            synced = report.synced.len(),
            "Playbook cache refreshed"
        );
        self.events.publish(DomainEvent::PlaybooksRefreshed {
            count: report.catalog,
            synced: report.synced.len(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    fn is_stale(&self, snapshot: &Snapshot) -> bool {
        self.invalidated.load(Ordering::SeqCst)
            || snapshot
                .refreshed_at
                .is_none_or(|at| at.elapsed() >= self.options.staleness)
    }

    /// Snapshot, refreshed first when stale. A failed refresh is logged and
    /// the previous snapshot served.
    ///
    /// Readers that queued behind an in-flight refresh serve its result
    /// instead of starting another one.
    async fn fresh(&self) -> Arc<Snapshot> {
        let snapshot = self.current().await;
        if !self.is_stale(&snapshot) {
            return snapshot;
        }
        let seen = self.attempts.load(Ordering::SeqCst);
        let _guard = self.refreshing.lock().await;

        let raced = self.attempts.load(Ordering::SeqCst) != seen;
        if raced || !self.is_stale(&*self.current().await) {
            return self.current().await;
        }
        if let Err(e) = self.refresh_locked().await {
            warn!(error = %e, "Playbook refresh failed, serving previous snapshot");
        }
        self.current().await
    }

    /// Classifier-eligible playbooks.
    pub async fn get_playbooks(&self) -> Vec<CachedPlaybook> {
        self.fresh().await.classifiable()
    }

    /// Every known playbook, including catalog-only ones.
    pub async fn catalog(&self) -> Vec<CachedPlaybook> {
        self.fresh().await.catalog.clone()
    }

    /// Playbooks matching `message`, highest priority first.
    pub async fn classify(&self, message: &str) -> Vec<CachedPlaybook> {
        classify_message(message, &self.get_playbooks().await)
    }

    pub async fn find_by_name(&self, name: &str) -> Option<CachedPlaybook> {
        self.fresh()
            .await
            .catalog
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Force a refresh on the next read.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }

    pub async fn status(&self) -> CacheStatus {
        let snapshot = self.current().await;
        CacheStatus {
            playbooks: snapshot.catalog.iter().filter(|p| p.is_classifiable()).count(),
            catalog: snapshot.catalog.len(),
            age_secs: snapshot.refreshed_at.map(|at| at.elapsed().as_secs()),
            stale: self.is_stale(&snapshot),
        }
    }
}

fn new_skill_from(playbook: &CachedPlaybook, agent_id: Option<&str>) -> NewSkill {
    NewSkill {
        name: playbook.name.clone(),
        description: playbook.description.clone(),
        instructions: playbook.instructions.clone(),
        keywords: playbook.keywords.clone(),
        priority: playbook.priority,
        required_tools: playbook.required_tools.clone(),
        trigger_type: Some(SCHEDULE_TRIGGER.into()),
        trigger_config: playbook.trigger_config.clone(),
        max_steps: playbook.max_steps,
        execution_plan: playbook.execution_plan.clone(),
        agent_id: agent_id.map(String::from),
    }
}
