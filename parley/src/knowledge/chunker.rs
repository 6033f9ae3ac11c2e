use crate::config::ProcessingConfig;
use crate::error::{ParleyError, Result};
use crate::models::DocumentChunk;

/// Splits text into fixed-size character windows with a fixed overlap
/// between consecutive windows. Boundaries always land on char boundaries,
/// so multi-byte text never gets split mid-codepoint.
pub struct WindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WindowChunker {
    pub fn new(config: &ProcessingConfig) -> Result<Self> {
        Self::with_sizes(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ParleyError::Validation(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ParleyError::Validation(format!(
                "Chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<DocumentChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index: u32 = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(DocumentChunk {
                index,
                content: chars[start..end].iter().collect(),
            });

            if end == chars.len() {
                break;
            }

            start += step;
            index += 1;
        }

        chunks
    }
}
