//! Prompt assembly and answer generation.
//!
//! Retrieved chunks are placed into the prompt most relevant first until the token budget is
//! spent. Whatever does not fit is dropped from the tail and reported back to the caller; when
//! even the top chunk is over budget it is truncated instead of dropped so the model always sees
//! some context.

use super::tokens::{TokenCounter, build_token_counter, truncate_to_budget};
use super::types::{Answer, PipelineError, ScoredChunk};
use crate::generation::{GenerationRequest, SharedGenerationClient};
use crate::index::compare_relevance;
use crate::request::CallOptions;

const PROMPT_PREAMBLE: &str = "Answer the following question using only the provided context.";

/// Chunk text admitted into the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPassage {
    /// Identifier of the source chunk.
    pub chunk_id: String,
    /// Text placed into the prompt, possibly truncated.
    pub text: String,
}

/// Context selected for a prompt.
#[derive(Debug, Clone, Default)]
pub struct BoundedContext {
    /// Passages in prompt order.
    pub passages: Vec<ContextPassage>,
    /// Retrieved chunks that did not fit.
    pub dropped: usize,
    /// Whether the leading passage was cut to fit.
    pub truncated: bool,
}

/// Renders prompts and asks the language model for an answer.
pub struct AnswerGenerator {
    client: SharedGenerationClient,
    model: String,
    temperature: f32,
    max_context_tokens: usize,
    counter: TokenCounter,
}

impl AnswerGenerator {
    /// Create a generator counting tokens with the encoding for `model`.
    pub fn new(
        client: SharedGenerationClient,
        model: impl Into<String>,
        temperature: f32,
        max_context_tokens: usize,
    ) -> Self {
        let model = model.into();
        let counter = build_token_counter(&model);
        Self {
            client,
            model,
            temperature,
            max_context_tokens,
            counter,
        }
    }

    /// Replace the token counter.
    pub fn with_token_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Select the chunks that fit the context budget.
    pub fn bound_context(&self, mut chunks: Vec<ScoredChunk>) -> BoundedContext {
        chunks.sort_by(compare_relevance);
        let total = chunks.len();
        let budget = self.max_context_tokens;

        let mut context = BoundedContext::default();
        let mut used = 0;
        for scored in chunks {
            let tokens = (self.counter)(&scored.chunk.text);
            if used + tokens <= budget {
                used += tokens;
                context.passages.push(ContextPassage {
                    chunk_id: scored.chunk.id,
                    text: scored.chunk.text,
                });
                continue;
            }
            if context.passages.is_empty() {
                let cut = truncate_to_budget(&scored.chunk.text, budget, &self.counter);
                if !cut.is_empty() {
                    context.passages.push(ContextPassage {
                        chunk_id: scored.chunk.id.clone(),
                        text: cut.to_string(),
                    });
                    context.truncated = true;
                }
            }
            break;
        }
        context.dropped = total - context.passages.len();
        context
    }

    /// Answer `question` from the retrieved chunks.
    ///
    /// An empty context is not an error; the model is still asked and will usually say it cannot
    /// answer.
    pub async fn generate(
        &self,
        question: &str,
        chunks: Vec<ScoredChunk>,
        options: &CallOptions,
    ) -> Result<Answer, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidParameter(
                "question must not be empty".to_string(),
            ));
        }

        let context = self.bound_context(chunks);
        if context.dropped > 0 || context.truncated {
            tracing::info!(
                kept = context.passages.len(),
                dropped = context.dropped,
                truncated = context.truncated,
                budget = self.max_context_tokens,
                "Context trimmed to fit token budget"
            );
        }

        let prompt = render_prompt(question, &context.passages);
        let text = self
            .client
            .generate(
                GenerationRequest {
                    model: self.model.clone(),
                    prompt,
                    temperature: self.temperature,
                },
                options,
            )
            .await?;

        Ok(Answer {
            text,
            chunk_ids: context
                .passages
                .into_iter()
                .map(|passage| passage.chunk_id)
                .collect(),
            dropped_chunks: context.dropped,
        })
    }
}

/// Fill the question-answering template.
pub fn render_prompt(question: &str, passages: &[ContextPassage]) -> String {
    let context = passages
        .iter()
        .map(|passage| passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{PROMPT_PREAMBLE}\n<context>\n{context}\n</context>\nQuestion: {question}")
}
