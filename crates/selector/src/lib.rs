//! Adaptive tool selection for Switchyard.
//!
//! Large tool catalogs waste context and confuse models. The
//! [`EmbeddingToolSelector`] embeds every tool description once (persisting
//! the vectors on disk), then narrows the catalog per message to the tools
//! most similar to what the user asked.

pub mod cache;
pub mod selector;
pub mod vector;

pub use cache::{CacheEntry, EmbeddingCache, description_hash};
pub use selector::{EmbeddingToolSelector, InitReport, SelectionStats, SelectorOptions};
pub use vector::cosine_similarity;
