use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{keys, CacheAside};
use crate::config::CacheConfig;
use crate::db::traits::ConversationStore;
use crate::error::{ParleyError, Result};
use crate::models::{Conversation, ConversationPage, ConversationTurn};

/// Cache-transparent access to conversation history and listings.
///
/// The cache holds disposable derived copies only; every read path falls back
/// to the repository, so flushing the cache never changes observable results.
#[derive(Clone)]
pub struct ConversationStateStore {
    store: Arc<dyn ConversationStore>,
    cache: Arc<CacheAside>,
    state_ttl_secs: u64,
    listing_ttl_secs: u64,
}

impl ConversationStateStore {
    pub fn new(store: Arc<dyn ConversationStore>, cache: CacheAside, config: &CacheConfig) -> Self {
        Self {
            store,
            cache: Arc::new(cache),
            state_ttl_secs: config.state_ttl_secs,
            listing_ttl_secs: config.listing_ttl_secs,
        }
    }

    /// Loads the full turn sequence for a conversation. A missing
    /// conversation is `NotFound` regardless of cache state.
    pub async fn load(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let key = keys::conversation_turns(conversation_id);
        let store = Arc::clone(&self.store);
        let id = conversation_id.to_string();

        self.cache
            .get_or_set(&key, self.state_ttl_secs, move || {
                let store = Arc::clone(&store);
                let id = id.clone();
                async move { load_from_repository(store.as_ref(), &id).await }
            })
            .await
    }

    /// Writes the in-flight turn sequence to cache only. Durable writes
    /// happen once per completed exchange via `save_exchange`.
    pub async fn save(&self, conversation_id: &str, turns: &[ConversationTurn]) -> Result<()> {
        let key = keys::conversation_turns(conversation_id);
        self.cache
            .cache()
            .set(&key, &turns.to_vec(), self.state_ttl_secs)
            .await
    }

    pub async fn invalidate(&self, conversation_id: &str) -> Result<()> {
        self.cache
            .invalidate(&keys::conversation_turns(conversation_id))
            .await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.store.get_conversation(conversation_id).await
    }

    pub async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.store.create_conversation(conversation).await?;
        self.invalidate_user_listings(&conversation.user_id).await;
        Ok(())
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let conversation = self.store.get_conversation(conversation_id).await?;
        let deleted = self.store.delete_conversation(conversation_id).await?;

        if deleted {
            if let Err(error) = self.invalidate(conversation_id).await {
                tracing::warn!(conversation_id, %error, "Failed to invalidate turn cache");
            }
            if let Some(conversation) = conversation {
                self.invalidate_user_listings(&conversation.user_id).await;
            }
        }

        Ok(deleted)
    }

    pub async fn save_exchange(
        &self,
        conversation_id: &str,
        user_id: &str,
        prompt: &ConversationTurn,
        response: &ConversationTurn,
    ) -> Result<()> {
        self.store
            .save_exchange(conversation_id, prompt, response)
            .await?;
        self.invalidate_user_listings(user_id).await;
        Ok(())
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let key = keys::user_conversations_page(user_id, page, page_size);
        self.register_listing_key(user_id, &key).await;

        let store = Arc::clone(&self.store);
        let user = user_id.to_string();
        self.cache
            .get_or_set(&key, self.listing_ttl_secs, move || {
                let store = Arc::clone(&store);
                let user = user.clone();
                async move { store.list_conversations(&user, page, page_size).await }
            })
            .await
    }

    pub async fn search_conversations(
        &self,
        user_id: &str,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let key = keys::user_conversation_search(user_id, term, page, page_size);
        self.register_listing_key(user_id, &key).await;

        let store = Arc::clone(&self.store);
        let user = user_id.to_string();
        let term = term.to_string();
        self.cache
            .get_or_set(&key, self.listing_ttl_secs, move || {
                let store = Arc::clone(&store);
                let user = user.clone();
                let term = term.clone();
                async move {
                    store
                        .search_conversations(&user, &term, page, page_size)
                        .await
                }
            })
            .await
    }

    /// Records a listing cache key in the per-user key set so later
    /// mutations can delete it point-wise. Best effort; entry TTLs are the
    /// backstop when the index is lost.
    async fn register_listing_key(&self, user_id: &str, key: &str) {
        let index_key = keys::user_listing_index(user_id);
        let cache = self.cache.cache();

        let mut known: HashSet<String> = match cache.get(&index_key).await {
            Ok(Some(keys)) => keys,
            Ok(None) => HashSet::new(),
            Err(error) => {
                tracing::warn!(user_id, %error, "Failed to read listing key index");
                return;
            }
        };

        if known.insert(key.to_string()) {
            if let Err(error) = cache.set(&index_key, &known, self.state_ttl_secs).await {
                tracing::warn!(user_id, %error, "Failed to update listing key index");
            }
        }
    }

    /// Deletes every known listing cache entry for a user. Cache faults are
    /// logged and swallowed; stale listings age out via TTL.
    pub async fn invalidate_user_listings(&self, user_id: &str) {
        let index_key = keys::user_listing_index(user_id);
        let cache = self.cache.cache();

        let known: HashSet<String> = match cache.get(&index_key).await {
            Ok(Some(keys)) => keys,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(user_id, %error, "Failed to read listing key index");
                return;
            }
        };

        for key in &known {
            if let Err(error) = cache.remove(key).await {
                tracing::warn!(user_id, key, %error, "Failed to invalidate listing entry");
            }
        }

        if let Err(error) = cache.remove(&index_key).await {
            tracing::warn!(user_id, %error, "Failed to clear listing key index");
        }
    }
}

async fn load_from_repository(
    store: &dyn ConversationStore,
    conversation_id: &str,
) -> Result<Vec<ConversationTurn>> {
    let conversation = store
        .get_conversation(conversation_id)
        .await?
        .ok_or_else(|| ParleyError::NotFound(format!("Conversation {conversation_id} not found")))?;

    let mut turns = store.get_turns_for_conversation(conversation_id).await?;

    if let Some(instruction) = conversation
        .system_instruction
        .filter(|value| !value.trim().is_empty())
    {
        turns.push(ConversationTurn::system(instruction));
    }

    Ok(turns)
}
