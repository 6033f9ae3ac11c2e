use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Conversation, ConversationPage, ConversationTurn, VectorMatch, VectorRecord,
};

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// The durable repository for conversations and their turn timelines. Owns
/// the authoritative copies; everything cached on top is disposable.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()>;
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;
    /// Persisted turns in strict chronological (position) order.
    async fn get_turns_for_conversation(&self, id: &str) -> Result<Vec<ConversationTurn>>;
    /// Append one completed prompt/response pair to the timeline and bump the
    /// conversation's `updated_at`. One call per exchange, never per token.
    async fn save_exchange(
        &self,
        conversation_id: &str,
        prompt: &ConversationTurn,
        response: &ConversationTurn,
    ) -> Result<()>;
    async fn list_conversations(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage>;
    async fn search_conversations(
        &self,
        user_id: &str,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage>;
    async fn delete_conversation(&self, id: &str) -> Result<bool>;
}

/// Append-only vector store partitioned by conversation. Records are
/// independently reconstructible from their source chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert_vectors(&self, records: &[VectorRecord]) -> Result<()>;
    /// Top-k nearest neighbors, filtered to `conversation_id`, in descending
    /// similarity order. The filter is correctness-critical: one
    /// conversation's records must never surface for another.
    async fn query_vectors(
        &self,
        embedding: &[f32],
        top_k: u32,
        conversation_id: &str,
    ) -> Result<Vec<VectorMatch>>;
}

// ---------------------------------------------------------------------------
// Unified backend supertrait
// ---------------------------------------------------------------------------

/// A complete database backend combining the store traits plus lifecycle
/// operations.
#[async_trait]
pub trait DatabaseBackend: ConversationStore + VectorIndex {
    /// Sync with remote (e.g. Turso replication). No-op for local-only backends.
    async fn sync(&self) -> Result<()>;
}
