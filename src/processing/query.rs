//! Question answering over a ready session.

use super::answer::AnswerGenerator;
use super::retriever::Retriever;
use super::types::{Answer, PipelineError, QuestionRequest};
use crate::request::CallOptions;

/// Retrieval followed by generation.
pub struct QueryPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl QueryPipeline {
    /// Compose a query pipeline.
    pub fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer a question using the document indexed in the request's session.
    pub async fn answer(
        &self,
        request: &QuestionRequest,
        options: &CallOptions,
    ) -> Result<Answer, PipelineError> {
        let context = self
            .retriever
            .query(
                &request.session_id,
                &request.question,
                request.top_k,
                options,
            )
            .await?;
        let answer = self
            .generator
            .generate(&request.question, context, options)
            .await?;
        tracing::info!(
            session_id = %request.session_id,
            chunks = answer.chunk_ids.len(),
            dropped = answer.dropped_chunks,
            "Answered question"
        );
        Ok(answer)
    }
}
