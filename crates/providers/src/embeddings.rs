//! OpenAI-compatible `/embeddings` client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use switchyard_config::EmbeddingConfig;
use switchyard_core::embedding::EmbeddingBackend;
use switchyard_core::error::EmbeddingError;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiEmbeddings {
    provider_id: String,
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddings {
    pub fn new(
        provider_id: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EmbeddingError::Backend(format!("http client: {e}")))?;

        Ok(Self {
            provider_id: provider_id.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[embeddings]` section. Fails without an API key.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            EmbeddingError::Backend("embeddings.api_key (or OPENAI_API_KEY) is not set".into())
        })?;
        Self::new(&config.provider_id, &config.model, &config.api_url, api_key)
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
            "encoding_format": "float",
        });
        debug!(model = %self.model, count = inputs.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Backend(format!("{}: {e}", self.provider_id)))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Embedding endpoint returned error");
            return Err(status_error(&self.provider_id, status, &body));
        }

        let parsed: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Backend(format!("failed to parse embedding response: {e}")))?;
        ordered_vectors(parsed, inputs.len())
    }
}

fn status_error(provider: &str, status: u16, body: &str) -> EmbeddingError {
    let reason = match status {
        429 => "rate limited".to_string(),
        401 | 403 => "authentication failed".to_string(),
        _ => format!("HTTP {status}: {body}"),
    };
    EmbeddingError::Backend(format!("{provider}: {reason}"))
}

/// Vectors in input order. The API tags each item with its input index and
/// does not promise to return them sorted.
fn ordered_vectors(
    response: EmbeddingApiResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if response.data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: response.data.len(),
        });
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            EmbeddingError::Backend(format!("embedding index {} out of range", item.index))
        })?;
        *slot = Some(item.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| EmbeddingError::Backend(format!("missing embedding {i}"))))
        .collect()
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch { expected: 1, got: 0 })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> EmbeddingApiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn vectors_are_reordered_by_index() {
        let response = parse(json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }));
        let vectors = ordered_vectors(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn count_mismatch_is_reported() {
        let response = parse(json!({"data": [{"index": 0, "embedding": [1.0]}]}));
        assert!(matches!(
            ordered_vectors(response, 2),
            Err(EmbeddingError::CountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn out_of_range_or_duplicate_index_fails() {
        let response = parse(json!({"data": [{"index": 5, "embedding": [1.0]}]}));
        assert!(ordered_vectors(response, 1).is_err());

        let response = parse(json!({"data": [
            {"index": 0, "embedding": [1.0]},
            {"index": 0, "embedding": [2.0]}
        ]}));
        assert!(ordered_vectors(response, 2).is_err());
    }

    #[test]
    fn status_errors_carry_context() {
        let msg = status_error("openai", 429, "").to_string();
        assert!(msg.contains("openai") && msg.contains("rate limited"));
        let msg = status_error("openai", 401, "").to_string();
        assert!(msg.contains("authentication failed"));
        let msg = status_error("openai", 500, "boom").to_string();
        assert!(msg.contains("HTTP 500: boom"));
    }

    #[test]
    fn from_config_uses_provider_and_model() {
        let config = EmbeddingConfig {
            api_key: Some("sk-test".into()),
            ..EmbeddingConfig::default()
        };
        let backend = OpenAiEmbeddings::from_config(&config).unwrap();
        assert_eq!(backend.provider_id(), "openai");
        assert_eq!(backend.model_id(), "text-embedding-3-small");
        assert!(!format!("{backend:?}").contains("sk-test"));

        assert!(OpenAiEmbeddings::from_config(&EmbeddingConfig::default()).is_err());
    }
}
