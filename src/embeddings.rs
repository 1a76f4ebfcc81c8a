//! Embedding generation.
//!
//! [`EmbeddingProvider`] is the seam between the pipeline and the embedding
//! service; [`OpenAiEmbedder`] talks to an OpenAI-compatible endpoint and
//! [`MockEmbeddingProvider`] produces deterministic vectors for tests.
//! [`embed_chunks`] layers the batch-size contract on top: contiguous batches
//! of at most `batch_size` inputs, output vectors index-aligned with the
//! input chunks no matter how the batching splits them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::PipelineError;

/// Converts batches of text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one batch; the i-th output vector corresponds to the i-th input.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Dimensionality of the vectors this provider produces.
    fn dimensions(&self) -> usize;
}

/// Embeds `chunks` in contiguous batches of at most `batch_size`.
///
/// Returns one vector per chunk, index-aligned. A provider failure on batch
/// `b` surfaces as [`PipelineError::Embedding`] naming that batch.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::Config(
            "embedding batch size must be at least 1".to_string(),
        ));
    }

    let mut vectors = Vec::with_capacity(chunks.len());
    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        let batch_vectors =
            provider
                .embed_batch(batch)
                .await
                .map_err(|err| PipelineError::Embedding {
                    batch: batch_index,
                    message: err.to_string(),
                })?;
        if batch_vectors.len() != batch.len() {
            return Err(PipelineError::Embedding {
                batch: batch_index,
                message: format!(
                    "provider returned {} vectors for {} inputs",
                    batch_vectors.len(),
                    batch.len()
                ),
            });
        }
        debug!(batch = batch_index, size = batch.len(), "embedded batch");
        vectors.extend(batch_vectors);
    }
    Ok(vectors)
}

/// Embeds a single query text (a one-item batch).
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, PipelineError> {
    let mut vectors = provider.embed_batch(&[text.to_string()]).await?;
    vectors.pop().ok_or_else(|| {
        PipelineError::EmbeddingRequest("provider returned no vector for the query".to_string())
    })
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// Retries rate-limit, server, and transport errors with bounded exponential
/// backoff; everything else fails immediately.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimensions: usize,
        max_retries: usize,
    ) -> Result<Self, PipelineError> {
        let client = build_bearer_client(api_key)?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            dimensions,
            max_retries: max_retries.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let mut attempt = 0usize;
        loop {
            let result = self.client.post(&self.endpoint).json(&request).send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse =
                            response.json().await.map_err(|err| {
                                PipelineError::EmbeddingRequest(format!(
                                    "failed to parse embedding response: {err}"
                                ))
                            })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        if parsed.data.len() != inputs.len() {
                            return Err(PipelineError::EmbeddingRequest(format!(
                                "service returned {} embeddings for {} inputs",
                                parsed.data.len(),
                                inputs.len()
                            )));
                        }
                        return Ok(parsed
                            .data
                            .into_iter()
                            .map(|entry| entry.embedding)
                            .collect());
                    }

                    let body = response.text().await.unwrap_or_default();
                    if retryable_status(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "retrying embedding request");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(PipelineError::EmbeddingRequest(format!(
                        "service returned {status}: {body}"
                    )));
                }
                Err(err) => {
                    if retryable_transport(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "retrying embedding request");
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(PipelineError::EmbeddingRequest(err.to_string()));
                }
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub(crate) fn build_bearer_client(api_key: &str) -> Result<reqwest::Client, PipelineError> {
    if api_key.trim().is_empty() {
        return Err(PipelineError::Config("missing API key".to_string()));
    }
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth)
            .map_err(|err| PipelineError::Config(format!("invalid API key: {err}")))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .default_headers(headers)
        .use_rustls_tls()
        .build()
        .map_err(PipelineError::Http)
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retryable_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Deterministic hash-derived embeddings for tests and offline runs.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(inputs
            .iter()
            .map(|text| hash_to_vec(text, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Maps text to a stable pseudo-random vector.
pub fn hash_to_vec(text: &str, dimensions: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let seed = hasher.finish();
    (0..dimensions)
        .map(|i| {
            let bits = seed.rotate_left((i as u32 % 64) * 7) ^ ((i as u64) << 24);
            (bits as f32) / (u64::MAX as f32)
        })
        .collect()
}
