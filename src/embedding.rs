//! Embedding provider abstraction.
//!
//! The [`Embedder`] trait is the seam between the retrieval pipeline and
//! whatever model actually produces vectors; the pipeline assumes a
//! deterministic dimensionality per model and nothing else. The bundled
//! implementation calls the OpenAI embeddings API.
//!
//! # Retry Strategy
//!
//! Transient failures retry with exponential backoff (1s, 2s, 4s, ...,
//! capped at 32s):
//! - HTTP 429 and 5xx: retry
//! - other 4xx: fail immediately
//! - network errors and timeouts: retry
//!
//! Exhausted retries surface as [`ProviderError::Unavailable`], which the
//! caller may treat as retryable. No retry policy exists above this layer.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

/// Produces embedding vectors for indexing and for queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "empty embedding response".to_string(),
            ));
        }
        Ok(vectors.swap_remove(0))
    }
}

/// Embedding provider backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiEmbedder {
    model: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiEmbedder {
    /// Build a provider from configuration.
    ///
    /// Fails when `OPENAI_API_KEY` is not set or the HTTP client cannot be
    /// constructed.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                        return parse_embeddings_response(&json);
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(ProviderError::Unavailable(format!(
                            "embeddings API {}: {}",
                            status, message
                        )));
                        continue;
                    }

                    return Err(ProviderError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) => {
                    last_err = Some(ProviderError::Unavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Unavailable("embedding failed".to_string())))
    }
}

/// Pull the `data[].embedding` arrays out of the API response, in order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing data array".to_string()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("missing embedding".to_string()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    Ok(embeddings)
}
