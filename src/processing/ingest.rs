//! Ingestion pipeline: validate, split, embed, and publish an index into a session.

use super::chunking::ChunkSplitter;
use super::types::{ChunkingOverrides, IngestOutcome, IngestRequest, PipelineError};
use crate::embedding::SharedEmbeddingClient;
use crate::index::VectorIndex;
use crate::request::CallOptions;
use crate::session::{SessionStore, validate_session_id};
use std::sync::Arc;
use uuid::Uuid;

/// Turns raw documents into ready session indexes.
pub struct IngestionPipeline {
    sessions: Arc<SessionStore>,
    embedder: SharedEmbeddingClient,
    defaults: ChunkSplitter,
    batch_size: usize,
}

impl IngestionPipeline {
    /// Build a pipeline writing into `sessions`.
    pub fn new(
        sessions: Arc<SessionStore>,
        embedder: SharedEmbeddingClient,
        defaults: ChunkSplitter,
        batch_size: usize,
    ) -> Self {
        Self {
            sessions,
            embedder,
            defaults,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest a document, replacing whatever the target session held before.
    ///
    /// Argument problems (`InvalidParameter`, `EmptyInput`) are reported before the session is
    /// touched. Once the session is `ingesting`, any failure leaves it `failed` and is returned
    /// unchanged.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        options: &CallOptions,
    ) -> Result<IngestOutcome, PipelineError> {
        let IngestRequest {
            session_id,
            document,
            chunking,
        } = request;

        if document.id.trim().is_empty() {
            return Err(PipelineError::InvalidParameter(
                "document id must not be empty".to_string(),
            ));
        }
        let session_id = match session_id {
            Some(session_id) => {
                validate_session_id(&session_id)?;
                session_id
            }
            None => Uuid::new_v4().to_string(),
        };
        let splitter = self.splitter_for(chunking)?;
        if document.text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let chunks = splitter.split(&document.id, &document.text);
        let chunk_count = chunks.len();

        let session = self.sessions.get_or_create(&session_id);
        let guard = session.begin_ingest(&document.id);
        tracing::info!(
            session_id = %session_id,
            document_id = %document.id,
            chunks = chunk_count,
            chunk_size = splitter.chunk_size(),
            overlap = splitter.overlap(),
            epoch = guard.epoch(),
            "Ingesting document"
        );

        let index =
            match VectorIndex::build(chunks, self.embedder.as_ref(), self.batch_size, options).await
            {
                Ok(index) => index,
                Err(error) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %error,
                        "Ingestion failed"
                    );
                    guard.fail(error.to_string());
                    return Err(error);
                }
            };
        guard.complete(index)?;

        tracing::info!(session_id = %session_id, chunks = chunk_count, "Session ready");
        Ok(IngestOutcome {
            session_id,
            document_id: document.id,
            chunk_count,
            chunk_size: splitter.chunk_size(),
            chunk_overlap: splitter.overlap(),
        })
    }

    /// Resolve per-request overrides against the configured defaults.
    ///
    /// When only the chunk size is overridden the default overlap is clamped below it.
    fn splitter_for(&self, overrides: ChunkingOverrides) -> Result<ChunkSplitter, PipelineError> {
        match (overrides.chunk_size, overrides.chunk_overlap) {
            (None, None) => Ok(self.defaults),
            (Some(size), None) => {
                ChunkSplitter::new(size, self.defaults.overlap().min(size.saturating_sub(1)))
            }
            (size, overlap) => ChunkSplitter::new(
                size.unwrap_or(self.defaults.chunk_size()),
                overlap.unwrap_or(self.defaults.overlap()),
            ),
        }
    }
}
