//! Embedding-based tool selection.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use switchyard_config::EmbeddingConfig;
use switchyard_core::embedding::EmbeddingBackend;
use switchyard_core::error::EmbeddingError;
use switchyard_core::model::ToolDefinition;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{EmbeddingCache, description_hash};
use crate::vector::cosine_similarity;

/// Selection method reported in [`SelectionStats`].
pub const METHOD: &str = "embedding";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorOptions {
    /// Minimum similarity for a tool to be added once `min_tools` is reached
    pub threshold: f32,
    /// Maximum tools added beyond the core set
    pub top_k: usize,
    /// Tools added beyond the core set regardless of threshold, when available
    pub min_tools: usize,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

impl SelectorOptions {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            threshold: config.threshold,
            top_k: config.top_k,
            min_tools: config.min_tools,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitReport {
    /// Tools whose vectors were reused
    pub cached: usize,
    /// Tools sent to the backend
    pub embedded: usize,
    /// The stored cache belonged to another provider/model and was dropped
    pub cache_rebuilt: bool,
}

/// Diagnostics for the most recent selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionStats {
    pub method: String,
    pub total_tools: usize,
    pub selected_count: usize,
    pub top_score: Option<f32>,
    pub core_tool_count: usize,
    /// Every scored non-core tool, best first
    pub ranked: Vec<(String, f32)>,
}

/// Narrows a tool catalog to the tools most similar to a message.
pub struct EmbeddingToolSelector {
    backend: Arc<dyn EmbeddingBackend>,
    cache_path: Option<PathBuf>,
    options: SelectorOptions,
    /// `None` until `initialize` succeeds. Swapped whole, never edited in place.
    cache: RwLock<Option<Arc<EmbeddingCache>>>,
    /// Serializes `initialize` calls; readers never wait on it
    initializing: tokio::sync::Mutex<()>,
    last_stats: Mutex<Option<SelectionStats>>,
}

impl EmbeddingToolSelector {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, options: SelectorOptions) -> Self {
        Self {
            backend,
            cache_path: None,
            options,
            cache: RwLock::new(None),
            initializing: tokio::sync::Mutex::new(()),
            last_stats: Mutex::new(None),
        }
    }

    /// Persist vectors to (and seed them from) `path`.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn options(&self) -> SelectorOptions {
        self.options
    }

    pub async fn is_initialized(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// Embed every tool not already cached under its current description.
    ///
    /// Uncached tools go to the backend in one batch, outside any lock that
    /// `select_tools` takes; the finished cache is swapped in at the end.
    /// Backend failures are returned and leave the selector's previous
    /// state untouched.
    pub async fn initialize(&self, tools: &[ToolDefinition]) -> Result<InitReport, EmbeddingError> {
        let _initializing = self.initializing.lock().await;
        let provider = self.backend.provider_id().to_string();
        let model = self.backend.model_id().to_string();

        let current = self.cache.read().await.clone();
        let mut cache = match current {
            Some(cache) => EmbeddingCache::clone(&cache),
            None => self
                .cache_path
                .as_deref()
                .and_then(EmbeddingCache::load)
                .unwrap_or_else(|| EmbeddingCache::new(&provider, &model)),
        };

        let mut report = InitReport::default();
        if !cache.matches(&provider, &model) {
            info!(
                cached_provider = %cache.provider,
                cached_model = %cache.model,
                provider = %provider,
                model = %model,
                "Embedding model changed, discarding cache"
            );
            cache = EmbeddingCache::new(&provider, &model);
            report.cache_rebuilt = true;
        }

        let mut pending = Vec::new();
        for tool in tools {
            let hash = description_hash(&tool.name, &tool.description);
            if cache.get(&tool.name, &hash).is_some() {
                report.cached += 1;
            } else {
                pending.push((tool, hash));
            }
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending
                .iter()
                .map(|(tool, _)| format!("{}: {}", tool.name, tool.description))
                .collect();
            let vectors = self.backend.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            for ((tool, hash), vector) in pending.into_iter().zip(vectors) {
                cache.insert(tool.name.clone(), hash, vector);
            }
            report.embedded = texts.len();
        }

        if report.embedded > 0 || report.cache_rebuilt {
            if let Some(path) = &self.cache_path {
                if let Err(e) = cache.save(path) {
                    warn!(error = %e, "Failed to persist embedding cache");
                }
            }
        }

        info!(
            cached = report.cached,
            embedded = report.embedded,
            rebuilt = report.cache_rebuilt,
            "Tool selector initialized"
        );
        *self.cache.write().await = Some(Arc::new(cache));
        Ok(report)
    }

    /// Core tools plus the best-matching others for `message`.
    ///
    /// Non-core tools are added best first until `top_k` is reached, or
    /// until a score falls below the threshold once `min_tools` have been
    /// added. Tools with no vector are skipped.
    pub async fn select_tools(
        &self,
        message: &str,
        tools: &[ToolDefinition],
        core_tool_names: &[String],
    ) -> Result<Vec<ToolDefinition>, EmbeddingError> {
        let cache = self
            .cache
            .read()
            .await
            .clone()
            .ok_or(EmbeddingError::NotInitialized)?;

        let query = self.backend.embed(message).await?;

        let mut selected: Vec<ToolDefinition> = tools
            .iter()
            .filter(|t| core_tool_names.contains(&t.name))
            .cloned()
            .collect();
        let core_tool_count = selected.len();

        let mut scored: Vec<(&ToolDefinition, f32)> = tools
            .iter()
            .filter(|t| !core_tool_names.contains(&t.name))
            .filter_map(|t| {
                let vector = cache.vector(&t.name)?;
                Some((t, cosine_similarity(&query, vector)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut added = 0;
        for (tool, score) in &scored {
            if added >= self.options.top_k {
                break;
            }
            if *score < self.options.threshold && added >= self.options.min_tools {
                break;
            }
            selected.push((*tool).clone());
            added += 1;
        }

        let stats = SelectionStats {
            method: METHOD.into(),
            total_tools: tools.len(),
            selected_count: selected.len(),
            top_score: scored.first().map(|(_, s)| *s),
            core_tool_count,
            ranked: scored.iter().map(|(t, s)| (t.name.clone(), *s)).collect(),
        };
        debug!(
            total = stats.total_tools,
            selected = stats.selected_count,
            top_score = ?stats.top_score,
            "Tools selected"
        );
        *self.last_stats.lock().unwrap_or_else(PoisonError::into_inner) = Some(stats);

        Ok(selected)
    }

    pub fn get_last_selection_stats(&self) -> Option<SelectionStats> {
        self.last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
