//! Embedding client abstraction and adapters.
//!
//! Two backends are provided: the Ollama `/api/embed` endpoint and a deterministic hashing
//! embedder that runs in-process (handy for offline runs and tests).

use crate::config::{Config, EmbeddingProvider};
use crate::request::{CallOptions, Cancelled};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Vector size used by the hashing embedder when none is configured.
pub const DEFAULT_HASHING_DIMENSION: usize = 768;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached at all.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Provider did not answer within the allotted time.
    #[error("Embedding request timed out: {0}")]
    Timeout(String),
    /// Provider answered with a non-success status.
    #[error("Embedding provider rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body returned alongside the status.
        body: String,
    },
    /// Provider answered with a body that could not be interpreted.
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
    /// Provider returned vectors of an unexpected size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the caller expected.
        expected: usize,
        /// Dimension the provider produced.
        actual: usize,
    },
    /// Caller cancelled the request.
    #[error("Embedding request cancelled")]
    Cancelled,
}

impl EmbeddingClientError {
    /// Whether the failure was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<Cancelled> for EmbeddingClientError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        options: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding client shared between the ingestion and query pipelines.
pub type SharedEmbeddingClient = Arc<dyn EmbeddingClient>;

/// Deterministic embedding client that folds text bytes into a normalized vector.
pub struct HashingEmbeddingClient {
    dimension: usize,
}

impl HashingEmbeddingClient {
    /// Construct a hashing embedder producing vectors of the given size.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

impl Default for HashingEmbeddingClient {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        options: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if options.is_cancelled() {
            return Err(EmbeddingClientError::Cancelled);
        }
        if self.dimension == 0 {
            return Err(EmbeddingClientError::MalformedResponse(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Embedding client backed by the Ollama `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingClient {
    /// Build a client for `model` served at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("docqa/embed")
            .timeout(timeout)
            .build()
            .map_err(|error| EmbeddingClientError::Unavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            dimension,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
        options: &CallOptions,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        tracing::debug!(model = %self.model, inputs = expected, "Requesting embeddings");

        let request = self.http.post(self.endpoint()).json(&json!({
            "model": self.model,
            "input": texts,
        }));
        let response = options.send(request).await?.map_err(|error| {
            if error.is_timeout() {
                EmbeddingClientError::Timeout(format!("{}: {error}", self.endpoint()))
            } else {
                EmbeddingClientError::Unavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::Rejected { status, body });
        }

        let body: EmbedResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                EmbeddingClientError::Timeout(error.to_string())
            } else {
                EmbeddingClientError::MalformedResponse(format!(
                    "failed to decode Ollama response: {error}"
                ))
            }
        })?;

        if body.embeddings.len() != expected {
            return Err(EmbeddingClientError::MalformedResponse(format!(
                "expected {expected} embeddings, got {}",
                body.embeddings.len()
            )));
        }
        if let Some(expected) = self.dimension {
            if let Some(vector) = body.embeddings.iter().find(|v| v.len() != expected) {
                return Err(EmbeddingClientError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        Ok(body.embeddings)
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(config: &Config) -> Result<SharedEmbeddingClient, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
            config.request_timeout(),
        )?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbeddingClient::new(
            config.embedding_dimension.unwrap_or(DEFAULT_HASHING_DIMENSION),
        ))),
    }
}
