//! In-memory vector index built once per ingestion.
//!
//! An index is immutable after [`VectorIndex::build`] returns; sessions swap whole indexes behind
//! an `Arc`, so readers never observe a partially built one. Search is brute-force cosine
//! similarity, which is plenty for a single document.

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::processing::{Chunk, PipelineError, ScoredChunk};
use crate::request::CallOptions;
use std::cmp::Ordering;

/// Chunk paired with its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Indexed chunk.
    pub chunk: Chunk,
    /// Embedding of the chunk text.
    pub vector: Vec<f32>,
}

/// Embedded chunks of a single document.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

impl VectorIndex {
    /// Embed every chunk and assemble the index.
    ///
    /// Chunks are sent to the embedding service in batches of `batch_size`. Any upstream error
    /// aborts the build; nothing partial is returned.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingClient,
        batch_size: usize,
        options: &CallOptions,
    ) -> Result<Self, PipelineError> {
        if chunks.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if batch_size == 0 {
            return Err(PipelineError::InvalidParameter(
                "embedding batch size must be greater than zero".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embedded = embedder.generate_embeddings(texts, options).await?;
            if embedded.len() != batch.len() {
                return Err(EmbeddingClientError::MalformedResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embedded.len()
                ))
                .into());
            }
            vectors.extend(embedded);
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(EmbeddingClientError::MalformedResponse(
                "embedding service returned empty vectors".to_string(),
            )
            .into());
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            }
            .into());
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        Ok(Self { entries, dimension })
    }

    /// Embed `text` and return the `k` closest chunks.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn EmbeddingClient,
        options: &CallOptions,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if k == 0 {
            return Err(PipelineError::InvalidParameter(
                "k must be greater than zero".to_string(),
            ));
        }
        let vector = embedder
            .generate_embeddings(vec![text.to_string()], options)
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingClientError::MalformedResponse(
                    "embedding service returned no vector for the query".to_string(),
                )
            })?;
        self.search(&vector, k)
    }

    /// Return the `k` entries closest to `query`, best first.
    ///
    /// Equal scores are ordered by chunk sequence.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, PipelineError> {
        if query.len() != self.dimension {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }
            .into());
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();
        scored.sort_by(compare_relevance);
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every vector in the index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Identifier of the document the index was built from.
    pub fn document_id(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.chunk.document_id.as_str())
    }
}

/// Descending score, then ascending sequence.
pub(crate) fn compare_relevance(left: &ScoredChunk, right: &ScoredChunk) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.chunk.sequence.cmp(&right.chunk.sequence))
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has no magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
