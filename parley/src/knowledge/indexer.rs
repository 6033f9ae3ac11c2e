use std::sync::Arc;

use nanoid::nanoid;

use crate::db::traits::VectorIndex;
use crate::embeddings::Embedder;
use crate::error::{ParleyError, Result};
use crate::knowledge::WindowChunker;
use crate::models::VectorRecord;

/// Turns raw reference text into embedded chunks tied to a conversation.
/// Indexing failures propagate; a document is either fully indexed or not
/// indexed at all from the caller's point of view.
pub struct KnowledgeIndexer {
    chunker: WindowChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl KnowledgeIndexer {
    pub fn new(
        chunker: WindowChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Chunks, embeds, and upserts one document. Returns the number of
    /// chunks written. Empty text indexes nothing and returns zero.
    pub async fn index_document(&self, conversation_id: &str, text: &str) -> Result<usize> {
        if text.trim().is_empty() {
            tracing::debug!(conversation_id, "Skipping empty document");
            return Ok(0);
        }
        let chunks = self.chunker.chunk(text);

        let passages: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_passages(passages).await?;

        if embeddings.len() != chunks.len() {
            return Err(ParleyError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                VectorRecord::new(
                    nanoid!(),
                    conversation_id.to_string(),
                    chunk.index,
                    chunk.content,
                    embedding,
                )
            })
            .collect();

        let written = records.len();
        self.index.upsert_vectors(&records).await?;

        tracing::info!(conversation_id, chunks = written, "Indexed document");

        Ok(written)
    }
}
