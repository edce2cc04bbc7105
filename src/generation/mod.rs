//! Language-model clients used to answer questions.
//!
//! The Ollama adapter issues non-streaming requests against `/api/generate` and maps every
//! failure to a variant that tells timeouts, rejections and malformed bodies apart.

use crate::config::Config;
use crate::request::{CallOptions, Cancelled};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while asking the language model for a completion.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached.
    #[error("Language model unavailable: {0}")]
    Unavailable(String),
    /// Provider did not answer in time.
    #[error("Language model request timed out: {0}")]
    Timeout(String),
    /// Provider returned an error status.
    #[error("Language model rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body returned alongside the status.
        body: String,
    },
    /// Provider response could not be parsed.
    #[error("Malformed language model response: {0}")]
    MalformedResponse(String),
    /// Caller cancelled the request.
    #[error("Language model request cancelled")]
    Cancelled,
}

impl GenerationClientError {
    /// Whether the failure was caused by a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<Cancelled> for GenerationClientError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Request payload passed to the language model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully rendered prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by language-model providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce a completion for the prompt.
    async fn generate(
        &self,
        request: GenerationRequest,
        options: &CallOptions,
    ) -> Result<String, GenerationClientError>;
}

/// Generation client shared across requests.
pub type SharedGenerationClient = Arc<dyn GenerationClient>;

/// Build the generation client for the configured Ollama runtime.
pub fn get_generation_client(
    config: &Config,
) -> Result<SharedGenerationClient, GenerationClientError> {
    Ok(Arc::new(OllamaGenerationClient::new(
        config.ollama_url.clone(),
        config.request_timeout(),
    )?))
}

/// Client for the Ollama `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Build a client talking to `base_url` with a default request timeout.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationClientError> {
        let http = Client::builder()
            .user_agent("docqa/generate")
            .timeout(timeout)
            .build()
            .map_err(|error| GenerationClientError::Unavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        options: &CallOptions,
    ) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        let response = options
            .send(self.http.post(self.endpoint()).json(&payload))
            .await?
            .map_err(|error| {
                if error.is_timeout() {
                    GenerationClientError::Timeout(format!("{}: {error}", self.endpoint()))
                } else {
                    GenerationClientError::Unavailable(format!(
                        "failed to reach Ollama at {}: {error}",
                        self.base_url
                    ))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::Rejected { status, body });
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                GenerationClientError::Timeout(error.to_string())
            } else {
                GenerationClientError::MalformedResponse(format!(
                    "failed to decode Ollama response: {error}"
                ))
            }
        })?;

        if !body.done {
            return Err(GenerationClientError::MalformedResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use tokio_util::sync::CancellationToken;

    fn client_for(server: &MockServer) -> OllamaGenerationClient {
        OllamaGenerationClient::new(server.base_url(), Duration::from_secs(5)).expect("client")
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "llama3".into(),
            prompt: "Question: why?".into(),
            temperature: 0.2,
        }
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(
                        r#"{"model": "llama3", "prompt": "Question: why?", "stream": false}"#,
                    );
                then.status(200).json_body(json!({
                    "response": "  Because.\n",
                    "done": true
                }));
            })
            .await;

        let answer = client_for(&server)
            .generate(request(), &CallOptions::default())
            .await
            .expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "Because.");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client_for(&server)
            .generate(request(), &CallOptions::default())
            .await
            .expect_err("error response");

        assert!(matches!(
            error,
            GenerationClientError::Rejected { status, ref body }
                if status == StatusCode::INTERNAL_SERVER_ERROR && body == "boom"
        ));
    }

    #[tokio::test]
    async fn ollama_client_rejects_incomplete_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(json!({"response": "partial", "done": false}));
            })
            .await;

        let error = client_for(&server)
            .generate(request(), &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, GenerationClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_distinguishes_timeouts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(json!({"response": "late", "done": true}));
            })
            .await;

        let error = client_for(&server)
            .generate(
                request(),
                &CallOptions::default().timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(error.is_timeout(), "unexpected error: {error:?}");
    }

    #[tokio::test]
    async fn ollama_client_reports_unreachable_runtime() {
        let client =
            OllamaGenerationClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
        let error = client
            .generate(request(), &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            GenerationClientError::Unavailable(_) | GenerationClientError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(json!({"response": "never", "done": true}));
            })
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let error = client_for(&server)
            .generate(request(), &CallOptions::with_token(token))
            .await
            .unwrap_err();

        assert!(matches!(error, GenerationClientError::Cancelled));
        mock.assert_hits_async(0).await;
    }
}
