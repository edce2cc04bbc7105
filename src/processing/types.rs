//! Core data types and error definitions for the question answering pipeline.

use crate::embedding::EmbeddingClientError;
use crate::generation::GenerationClientError;
use crate::session::SessionStatus;
use serde::Serialize;
use thiserror::Error;

/// Errors emitted by the ingestion and query pipelines.
///
/// Every variant maps to a stable [`PipelineError::kind`] so that callers can tell failures
/// apart without parsing messages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A caller-supplied argument was rejected before any work started.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// The document produced nothing to index.
    #[error("Document contains no text to index")]
    EmptyInput,
    /// Embedding provider failed while indexing or retrieving.
    #[error("Embedding service failed: {0}")]
    EmbeddingService(#[from] EmbeddingClientError),
    /// Language model failed while generating an answer.
    #[error("Model service failed: {0}")]
    ModelService(#[from] GenerationClientError),
    /// No session is registered under the identifier.
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    /// Session exists but has no usable index yet.
    #[error("Session {session_id} is not ready (state: {state})")]
    SessionNotReady {
        /// Session that was queried.
        session_id: String,
        /// State the session was in.
        state: SessionStatus,
    },
    /// The most recent ingestion of the session did not complete.
    #[error("Ingestion failed for session {session_id}: {reason}")]
    IngestionFailed {
        /// Session whose ingestion failed.
        session_id: String,
        /// Reason recorded when the ingestion failed.
        reason: String,
    },
}

impl PipelineError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::EmptyInput => "empty_input",
            Self::EmbeddingService(_) => "embedding_service_error",
            Self::ModelService(_) => "model_service_error",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionNotReady { .. } => "session_not_ready",
            Self::IngestionFailed { .. } => "ingestion_failed",
        }
    }

    /// Whether the failure was produced by argument validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::EmptyInput)
    }
}

/// Raw document text plus the identifier it was uploaded under.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier of the document, typically the uploaded filename.
    pub id: String,
    /// Extracted text.
    pub text: String,
}

impl Document {
    /// Create a document from an identifier and its text.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Contiguous span of document text used as the retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Identifier of the form `{document_id}:{sequence}`.
    pub id: String,
    /// Document the chunk was cut from.
    pub document_id: String,
    /// Position of the chunk within the document, starting at zero.
    pub sequence: usize,
    /// Character offset of the first character of the chunk.
    pub start: usize,
    /// Chunk text.
    pub text: String,
}

impl Chunk {
    pub(crate) fn new(document_id: &str, sequence: usize, start: usize, text: &str) -> Self {
        Self {
            id: format!("{document_id}:{sequence}"),
            document_id: document_id.to_string(),
            sequence,
            start,
            text: text.to_string(),
        }
    }
}

/// Chunk returned by retrieval together with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    /// Retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk (higher is closer).
    pub score: f32,
}

/// Answer produced for a question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Text generated by the language model.
    pub text: String,
    /// Chunks placed into the prompt, most relevant first.
    pub chunk_ids: Vec<String>,
    /// Retrieved chunks left out to respect the context budget.
    pub dropped_chunks: usize,
}

/// Per-request overrides for chunking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkingOverrides {
    /// Chunk size in characters.
    pub chunk_size: Option<usize>,
    /// Overlap in characters.
    pub chunk_overlap: Option<usize>,
}

/// Upload request handled by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Session to (re)populate; a fresh identifier is generated when absent.
    pub session_id: Option<String>,
    /// Document to index.
    pub document: Document,
    /// Optional chunking overrides.
    pub chunking: ChunkingOverrides,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Session that now serves the document.
    pub session_id: String,
    /// Identifier of the ingested document.
    pub document_id: String,
    /// Number of chunks embedded and indexed.
    pub chunk_count: usize,
    /// Chunk size used.
    pub chunk_size: usize,
    /// Overlap used.
    pub chunk_overlap: usize,
}

/// Question scoped to a session.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    /// Session holding the document index.
    pub session_id: String,
    /// Natural language question.
    pub question: String,
    /// Number of chunks to retrieve; the configured default applies when absent.
    pub top_k: Option<usize>,
}
