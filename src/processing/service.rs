//! Document service wiring the session store, pipelines, and metrics together.

use super::answer::AnswerGenerator;
use super::chunking::ChunkSplitter;
use super::ingest::IngestionPipeline;
use super::query::QueryPipeline;
use super::retriever::Retriever;
use super::types::{Answer, IngestOutcome, IngestRequest, PipelineError, QuestionRequest};
use crate::config::Config;
use crate::embedding::{SharedEmbeddingClient, get_embedding_client};
use crate::generation::{SharedGenerationClient, get_generation_client};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::request::CallOptions;
use crate::session::{SessionSnapshot, SessionStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Owns every long-lived component of the question answering core.
///
/// Construct once near process start and share through an `Arc`; all methods take `&self` and
/// are safe to call concurrently.
pub struct DocumentService {
    sessions: Arc<SessionStore>,
    ingestion: IngestionPipeline,
    query: QueryPipeline,
    metrics: PipelineMetrics,
}

/// Abstraction over the document service used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Chunk, embed, and index a document into a session.
    async fn ingest(
        &self,
        request: IngestRequest,
        options: CallOptions,
    ) -> Result<IngestOutcome, PipelineError>;

    /// Answer a question against a ready session.
    async fn answer(
        &self,
        request: QuestionRequest,
        options: CallOptions,
    ) -> Result<Answer, PipelineError>;

    /// Describe a single session.
    fn session(&self, session_id: &str) -> Result<SessionSnapshot, PipelineError>;

    /// Describe every session.
    fn sessions(&self) -> Vec<SessionSnapshot>;

    /// Forget a session and its index.
    fn remove_session(&self, session_id: &str) -> Result<(), PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build the service with the providers named in `config`.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        tracing::info!(
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            "Initializing embedding client"
        );
        let embedder = get_embedding_client(config)?;
        tracing::info!(model = %config.generation_model, "Initializing generation client");
        let generator = get_generation_client(config)?;
        Self::new(config, embedder, generator)
    }

    /// Build the service around explicit provider clients.
    pub fn new(
        config: &Config,
        embedder: SharedEmbeddingClient,
        generator: SharedGenerationClient,
    ) -> Result<Self, PipelineError> {
        let sessions = Arc::new(SessionStore::new());
        let splitter = ChunkSplitter::new(
            config.text_splitter_chunk_size,
            config.text_splitter_chunk_overlap,
        )?;
        let ingestion = IngestionPipeline::new(
            Arc::clone(&sessions),
            Arc::clone(&embedder),
            splitter,
            config.embedding_batch_size,
        );
        let retriever = Retriever::new(Arc::clone(&sessions), embedder, config.retrieval_top_k);
        let answers = AnswerGenerator::new(
            generator,
            config.generation_model.clone(),
            config.generation_temperature,
            config.generation_max_context_tokens,
        );

        Ok(Self {
            sessions,
            ingestion,
            query: QueryPipeline::new(retriever, answers),
            metrics: PipelineMetrics::new(),
        })
    }

    /// Chunk, embed, and index a document into a session.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        options: &CallOptions,
    ) -> Result<IngestOutcome, PipelineError> {
        match self.ingestion.ingest(request, options).await {
            Ok(outcome) => {
                self.metrics
                    .record_document(outcome.chunk_count as u64, outcome.chunk_size as u64);
                Ok(outcome)
            }
            Err(error) => {
                self.metrics.record_ingestion_failure();
                Err(error)
            }
        }
    }

    /// Answer a question against a ready session.
    pub async fn answer(
        &self,
        request: &QuestionRequest,
        options: &CallOptions,
    ) -> Result<Answer, PipelineError> {
        let result = self.query.answer(request, options).await;
        match &result {
            Ok(_) => self.metrics.record_answer(),
            Err(error) => {
                tracing::warn!(
                    session_id = %request.session_id,
                    kind = error.kind(),
                    error = %error,
                    "Question failed"
                );
                self.metrics.record_question_failure();
            }
        }
        result
    }

    /// Shared session registry.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn ingest(
        &self,
        request: IngestRequest,
        options: CallOptions,
    ) -> Result<IngestOutcome, PipelineError> {
        DocumentService::ingest(self, request, &options).await
    }

    async fn answer(
        &self,
        request: QuestionRequest,
        options: CallOptions,
    ) -> Result<Answer, PipelineError> {
        DocumentService::answer(self, &request, &options).await
    }

    fn session(&self, session_id: &str) -> Result<SessionSnapshot, PipelineError> {
        Ok(self.sessions.get(session_id)?.snapshot())
    }

    fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions.list()
    }

    fn remove_session(&self, session_id: &str) -> Result<(), PipelineError> {
        self.sessions.remove(session_id)?;
        tracing::info!(session_id, "Session removed");
        Ok(())
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}
