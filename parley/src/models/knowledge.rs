use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable slice of source text produced by the window chunker. Written once
/// at ingestion, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// Monotonically increasing position within the source text, from zero.
    pub index: u32,
    pub content: String,
}

/// An embedded chunk tagged with its owning conversation. Records are
/// append-only and logically partitioned by `conversation_id`: retrieval for
/// one conversation must never surface another's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub conversation_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn new(
        id: String,
        conversation_id: String,
        chunk_index: u32,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            chunk_index,
            content,
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// One ranked similarity-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub conversation_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub score: f32,
}
