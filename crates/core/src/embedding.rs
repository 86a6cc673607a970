//! Embedding backend boundary.

use async_trait::async_trait;
use crate::error::EmbeddingError;

/// A text-embedding backend.
///
/// `provider_id` and `model_id` identify the vector space; cached vectors are
/// only reused when both match exactly.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn provider_id(&self) -> &str;

    fn model_id(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;

    /// Embed many texts in one call. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError>;
}
