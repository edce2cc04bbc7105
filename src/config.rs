use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default Ollama endpoint used when `OLLAMA_URL` is not set.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {reason}")]
    InvalidValue {
        /// Variable that failed validation.
        key: String,
        /// Human readable explanation of the failure.
        reason: String,
    },
}

/// Runtime configuration for the question answering server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama runtime serving embeddings and completions.
    pub ollama_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Expected dimensionality of the produced vectors, when known.
    pub embedding_dimension: Option<usize>,
    /// Number of chunks sent per embedding request.
    pub embedding_batch_size: usize,
    /// Language model used to answer questions.
    pub generation_model: String,
    /// Sampling temperature forwarded to the language model.
    pub generation_temperature: f32,
    /// Token budget for the context placed into a single prompt.
    pub generation_max_context_tokens: usize,
    /// Chunk size in characters.
    pub text_splitter_chunk_size: usize,
    /// Overlap between neighbouring chunks in characters.
    pub text_splitter_chunk_overlap: usize,
    /// Number of chunks retrieved per question when the caller does not ask for a count.
    pub retrieval_top_k: usize,
    /// Default timeout applied to every upstream HTTP call.
    pub request_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic byte-hashing embedder that needs no external service.
    Hashing,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset so that `.env` templates with empty entries fall back
    /// to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVariable(key.into()));

        let config = Self {
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            embedding_provider: parse_or(get("EMBEDDING_PROVIDER"), "EMBEDDING_PROVIDER", || {
                EmbeddingProvider::Ollama
            })?,
            embedding_model: required("EMBEDDING_MODEL")?,
            embedding_dimension: get("EMBEDDING_DIMENSION")
                .map(|value| parse_value(&value, "EMBEDDING_DIMENSION"))
                .transpose()?,
            embedding_batch_size: parse_or(get("EMBEDDING_BATCH_SIZE"), "EMBEDDING_BATCH_SIZE", || 32)?,
            generation_model: required("GENERATION_MODEL")?,
            generation_temperature: parse_or(
                get("GENERATION_TEMPERATURE"),
                "GENERATION_TEMPERATURE",
                || 0.2,
            )?,
            generation_max_context_tokens: parse_or(
                get("GENERATION_MAX_CONTEXT_TOKENS"),
                "GENERATION_MAX_CONTEXT_TOKENS",
                || 3072,
            )?,
            text_splitter_chunk_size: parse_or(
                get("TEXT_SPLITTER_CHUNK_SIZE"),
                "TEXT_SPLITTER_CHUNK_SIZE",
                || 1000,
            )?,
            text_splitter_chunk_overlap: parse_or(
                get("TEXT_SPLITTER_CHUNK_OVERLAP"),
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                || 200,
            )?,
            retrieval_top_k: parse_or(get("RETRIEVAL_TOP_K"), "RETRIEVAL_TOP_K", || 4)?,
            request_timeout_secs: parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                || 120,
            )?,
            server_port: get("SERVER_PORT")
                .map(|value| parse_value(&value, "SERVER_PORT"))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if self.text_splitter_chunk_size == 0 {
            return Err(invalid("TEXT_SPLITTER_CHUNK_SIZE", "must be greater than zero"));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(invalid(
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                "must be smaller than TEXT_SPLITTER_CHUNK_SIZE",
            ));
        }
        if self.embedding_dimension == Some(0) {
            return Err(invalid("EMBEDDING_DIMENSION", "must be greater than zero"));
        }
        if self.embedding_batch_size == 0 {
            return Err(invalid("EMBEDDING_BATCH_SIZE", "must be greater than zero"));
        }
        if self.retrieval_top_k == 0 {
            return Err(invalid("RETRIEVAL_TOP_K", "must be greater than zero"));
        }
        if self.generation_max_context_tokens == 0 {
            return Err(invalid(
                "GENERATION_MAX_CONTEXT_TOKENS",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Default timeout for upstream requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or<T, D>(value: Option<String>, key: &str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    D: FnOnce() -> T,
{
    match value {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default()),
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("could not parse '{raw}'"),
    })
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" | "hash" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// A `.env` file in the working directory is read first when present. Calling this twice keeps
/// the first configuration.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        ollama_url = %config.ollama_url,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        generation_model = %config.generation_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
