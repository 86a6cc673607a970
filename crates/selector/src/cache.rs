//! Persistent embedding cache.
//!
//! Stored as one JSON document:
//!
//! ```json
//! { "provider": "openai", "model": "text-embedding-3-small",
//!   "entries": { "send_email": { "hash": "9f2c...", "vector": [0.01, ...] } } }
//! ```
//!
//! Vectors are only comparable within one embedding space, so a cache whose
//! provider or model differs from the current backend is discarded whole.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use switchyard_core::error::EmbeddingError;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// [`description_hash`] of the text that was embedded
    pub hash: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingCache {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
}

/// Hash identifying a tool's embedded text.
pub fn description_hash(name: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(description.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl EmbeddingCache {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read a cache file. Returns `None` if it is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(cache) => {
                debug!(path = %path.display(), entries = cache.entries.len(), "Embedding cache loaded");
                Some(cache)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted embedding cache");
                None
            }
        }
    }

    /// Write the cache file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), EmbeddingError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EmbeddingError::Cache(e.to_string()))?;
        }
        let json = serde_json::to_string(self).map_err(|e| EmbeddingError::Cache(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| EmbeddingError::Cache(e.to_string()))?;
        debug!(path = %path.display(), entries = self.entries.len(), "Embedding cache saved");
        Ok(())
    }

    /// Whether vectors in this cache were produced by `provider`/`model`.
    pub fn matches(&self, provider: &str, model: &str) -> bool {
        self.provider == provider && self.model == model
    }

    /// Cached vector for `name`, only if it was computed from `hash`.
    pub fn get(&self, name: &str, hash: &str) -> Option<&[f32]> {
        self.entries
            .get(name)
            .filter(|entry| entry.hash == hash)
            .map(|entry| entry.vector.as_slice())
    }

    /// Cached vector for `name`, whatever text produced it.
    pub fn vector(&self, name: &str) -> Option<&[f32]> {
        self.entries.get(name).map(|entry| entry.vector.as_slice())
    }

    pub fn insert(&mut self, name: impl Into<String>, hash: String, vector: Vec<f32>) {
        self.entries.insert(name.into(), CacheEntry { hash, vector });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hash_depends_on_name_and_description() {
        let a = description_hash("send_email", "Send an email");
        assert_eq!(a, description_hash("send_email", "Send an email"));
        assert_ne!(a, description_hash("send_email", "Send a message"));
        assert_ne!(a, description_hash("send_emai", "lSend an email"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut cache = EmbeddingCache::new("openai", "text-embedding-3-small");
        cache.insert("send_email", description_hash("send_email", "x"), vec![0.1, 0.2]);
        cache.save(&path).unwrap();

        let loaded = EmbeddingCache::load(&path).unwrap();
        assert_eq!(loaded, cache);
        assert!(loaded.matches("openai", "text-embedding-3-small"));
        assert!(!loaded.matches("openai", "text-embedding-3-large"));
    }

    #[test]
    fn stale_hash_misses() {
        let mut cache = EmbeddingCache::new("p", "m");
        cache.insert("t", "old".into(), vec![1.0]);
        assert!(cache.get("t", "old").is_some());
        assert!(cache.get("t", "new").is_none());
        assert!(cache.vector("t").is_some());
    }

    #[test]
    fn corrupted_or_missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        assert!(EmbeddingCache::load(&path).is_none());
        std::fs::write(&path, "{not json").unwrap();
        assert!(EmbeddingCache::load(&path).is_none());
    }
}
