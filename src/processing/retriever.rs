//! Session-scoped retrieval of the chunks most relevant to a question.

use super::types::{PipelineError, ScoredChunk};
use crate::embedding::SharedEmbeddingClient;
use crate::request::CallOptions;
use crate::session::SessionStore;
use std::sync::Arc;

/// Looks up a session's index and runs similarity search against it.
pub struct Retriever {
    sessions: Arc<SessionStore>,
    embedder: SharedEmbeddingClient,
    default_top_k: usize,
}

impl Retriever {
    /// Create a retriever reading from `sessions`.
    pub fn new(
        sessions: Arc<SessionStore>,
        embedder: SharedEmbeddingClient,
        default_top_k: usize,
    ) -> Self {
        Self {
            sessions,
            embedder,
            default_top_k,
        }
    }

    /// Return up to `top_k` chunks for `question`, best first.
    ///
    /// The index is pinned before the query is embedded, so a concurrent re-ingestion cannot mix
    /// chunks from two documents into one result.
    pub async fn query(
        &self,
        session_id: &str,
        question: &str,
        top_k: Option<usize>,
        options: &CallOptions,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        let k = top_k.unwrap_or(self.default_top_k);
        if k == 0 {
            return Err(PipelineError::InvalidParameter(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidParameter(
                "question must not be empty".to_string(),
            ));
        }

        let index = self.sessions.get(session_id)?.ready_index()?;
        let results = index
            .query(question, k, self.embedder.as_ref(), options)
            .await?;
        tracing::debug!(
            session_id,
            k,
            hits = results.len(),
            top_score = results.first().map(|hit| hit.score),
            "Retrieved context"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingClient;
    use crate::index::VectorIndex;
    use crate::processing::ChunkSplitter;

    async fn ready_store(text: &str) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new());
        let embedder = HashingEmbeddingClient::new(64);
        let chunks = ChunkSplitter::new(16, 0).unwrap().split("doc", text);
        let index = VectorIndex::build(chunks, &embedder, 4, &CallOptions::default())
            .await
            .unwrap();
        let session = store.get_or_create("s1");
        session.begin_ingest("doc").complete(index).unwrap();
        store
    }

    fn retriever(store: Arc<SessionStore>) -> Retriever {
        Retriever::new(store, Arc::new(HashingEmbeddingClient::new(64)), 2)
    }

    #[tokio::test]
    async fn applies_default_top_k() {
        let store = ready_store("alpha beta gamma delta epsilon zeta eta theta iota kappa").await;
        let hits = retriever(store)
            .query("s1", "gamma", None, &CallOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn rejects_bad_arguments() {
        let store = ready_store("some text").await;
        let retriever = retriever(store);
        let options = CallOptions::default();

        let error = retriever.query("s1", "q", Some(0), &options).await.unwrap_err();
        assert!(matches!(error, PipelineError::InvalidParameter(_)));

        let error = retriever.query("s1", "  ", None, &options).await.unwrap_err();
        assert!(matches!(error, PipelineError::InvalidParameter(_)));
    }

    #[tokio::test]
    async fn reports_session_state() {
        let store = Arc::new(SessionStore::new());
        store.get_or_create("empty");
        let retriever = retriever(Arc::clone(&store));
        let options = CallOptions::default();

        let error = retriever.query("missing", "q", None, &options).await.unwrap_err();
        assert!(matches!(error, PipelineError::SessionNotFound(_)));

        let error = retriever.query("empty", "q", None, &options).await.unwrap_err();
        assert!(matches!(error, PipelineError::SessionNotReady { .. }));
    }
}
