//! Sliding-window chunking over document characters.
//!
//! Windows are measured in Unicode scalar values so multi-byte text is never cut inside a
//! character. Each window spans `chunk_size` characters and the next one starts
//! `chunk_size - overlap` characters later; the last window may be shorter.

use super::types::{Chunk, PipelineError};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkSplitter {
    /// Validate the window parameters.
    ///
    /// Fails with [`PipelineError::InvalidParameter`] unless `chunk_size > 0` and
    /// `overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidParameter(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(PipelineError::InvalidParameter(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Window length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by neighbouring windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks attributed to `document_id`.
    ///
    /// Returns an empty vector for empty input.
    pub fn split(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character plus the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = offsets.len() - 1;
        let stride = self.chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(char_count.div_ceil(stride));
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            let sequence = chunks.len();
            chunks.push(Chunk::new(
                document_id,
                sequence,
                start,
                &text[offsets[start]..offsets[end]],
            ));
            if end == char_count {
                break;
            }
            start += stride;
        }

        tracing::trace!(
            document_id,
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap,
            "Split document"
        );
        chunks
    }
}
