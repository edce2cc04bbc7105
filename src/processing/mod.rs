//! Document question answering pipeline: chunking, indexing, retrieval, and generation.

pub mod answer;
pub mod chunking;
mod ingest;
mod query;
mod retriever;
mod service;
pub mod tokens;
pub mod types;

pub use answer::{AnswerGenerator, BoundedContext, ContextPassage, render_prompt};
pub use chunking::ChunkSplitter;
pub use ingest::IngestionPipeline;
pub use query::QueryPipeline;
pub use retriever::Retriever;
pub use service::{DocumentApi, DocumentService};
pub use types::{
    Answer, Chunk, ChunkingOverrides, Document, IngestOutcome, IngestRequest, PipelineError,
    QuestionRequest, ScoredChunk,
};
