use async_trait::async_trait;

use crate::db::connection::Database;
use crate::db::repository::{ConversationRepository, VectorRepository};
use crate::db::traits::{ConversationStore, DatabaseBackend, VectorIndex};
use crate::error::Result;
use crate::models::{
    Conversation, ConversationPage, ConversationTurn, VectorMatch, VectorRecord,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for LibSqlBackend {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.db.connect()?;
        ConversationRepository::create(&conn, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let conn = self.db.connect()?;
        ConversationRepository::get_by_id(&conn, id).await
    }

    async fn get_turns_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationTurn>> {
        let conn = self.db.connect()?;
        ConversationRepository::get_turns(&conn, conversation_id).await
    }

    async fn save_exchange(
        &self,
        conversation_id: &str,
        prompt: &ConversationTurn,
        response: &ConversationTurn,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        ConversationRepository::save_exchange(&conn, conversation_id, prompt, response).await
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let conn = self.db.connect()?;
        ConversationRepository::list(&conn, user_id, page, page_size).await
    }

    async fn search_conversations(
        &self,
        user_id: &str,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let conn = self.db.connect()?;
        ConversationRepository::search(&conn, user_id, term, page, page_size).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        VectorRepository::delete_by_conversation(&conn, id).await?;
        ConversationRepository::delete(&conn, id).await
    }
}

#[async_trait]
impl VectorIndex for LibSqlBackend {
    async fn upsert_vectors(&self, records: &[VectorRecord]) -> Result<()> {
        let conn = self.db.connect()?;
        VectorRepository::upsert_batch(&conn, records).await
    }

    async fn query_vectors(
        &self,
        embedding: &[f32],
        top_k: u32,
        conversation_id: &str,
    ) -> Result<Vec<VectorMatch>> {
        let conn = self.db.connect()?;
        VectorRepository::search_similar(&conn, embedding, top_k, conversation_id).await
    }
}

#[async_trait]
impl DatabaseBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }
}
