//! Shared fakes for integration tests: an in-memory database backend, a
//! deterministic embedder, a scripted inference connector, and a plain
//! in-memory cache backend.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use parley::cache::CacheBackend;
use parley::db::traits::{ConversationStore, DatabaseBackend, VectorIndex};
use parley::embeddings::Embedder;
use parley::error::{ParleyError, Result};
use parley::llm::{
    ChatCompletion, ChatOptions, InferenceConnector, TokenDelta, TokenStream,
};
use parley::models::{
    Conversation, ConversationPage, ConversationSummary, ConversationTurn, VectorMatch,
    VectorRecord,
};

#[derive(Default)]
struct MemoryBackendInner {
    conversations: HashMap<String, Conversation>,
    turns: HashMap<String, Vec<ConversationTurn>>,
    vectors: Vec<VectorRecord>,
}

/// In-memory stand-in for the libsql backend.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryBackendInner>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_conversation(conversation: Conversation) -> Arc<Self> {
        let backend = Self::default();
        backend
            .inner
            .lock()
            .unwrap()
            .conversations
            .insert(conversation.id.clone(), conversation);
        Arc::new(backend)
    }

    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .turns
            .get(conversation_id)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub fn stored_turns(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        self.inner
            .lock()
            .unwrap()
            .turns
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn vector_count(&self) -> usize {
        self.inner.lock().unwrap().vectors.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryBackend {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.inner.lock().unwrap().conversations.get(id).cloned())
    }

    async fn get_turns_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .turns
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_exchange(
        &self,
        conversation_id: &str,
        prompt: &ConversationTurn,
        response: &ConversationTurn,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let turns = inner.turns.entry(conversation_id.to_string()).or_default();
        turns.push(prompt.clone());
        turns.push(response.clone());
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<ConversationSummary> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                user_id: c.user_id.clone(),
                title: c.title.clone(),
                turn_count: inner.turns.get(&c.id).map(|t| t.len() as u32).unwrap_or(0),
                updated_at: c.updated_at,
            })
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = items.len() as u64;
        let start = (page as usize) * (page_size as usize);
        let items = items
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(ConversationPage {
            items,
            page,
            page_size,
            total,
        })
    }

    async fn search_conversations(
        &self,
        user_id: &str,
        term: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ConversationPage> {
        let needle = term.to_lowercase();
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<ConversationSummary> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| {
                c.title
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                    || inner
                        .turns
                        .get(&c.id)
                        .map(|turns| {
                            turns
                                .iter()
                                .any(|t| t.content.to_lowercase().contains(&needle))
                        })
                        .unwrap_or(false)
            })
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                user_id: c.user_id.clone(),
                title: c.title.clone(),
                turn_count: inner.turns.get(&c.id).map(|t| t.len() as u32).unwrap_or(0),
                updated_at: c.updated_at,
            })
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = items.len() as u64;
        let start = (page as usize) * (page_size as usize);
        let items = items
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(ConversationPage {
            items,
            page,
            page_size,
            total,
        })
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.turns.remove(id);
        inner.vectors.retain(|v| v.conversation_id != id);
        Ok(inner.conversations.remove(id).is_some())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for MemoryBackend {
    async fn upsert_vectors(&self, records: &[VectorRecord]) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .vectors
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn query_vectors(
        &self,
        embedding: &[f32],
        top_k: u32,
        conversation_id: &str,
    ) -> Result<Vec<VectorMatch>> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<VectorMatch> = inner
            .vectors
            .iter()
            .filter(|v| v.conversation_id == conversation_id)
            .map(|v| VectorMatch {
                conversation_id: v.conversation_id.clone(),
                chunk_index: v.chunk_index,
                content: v.content.clone(),
                score: cosine(embedding, &v.embedding),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        matches.truncate(top_k as usize);
        Ok(matches)
    }
}

#[async_trait]
impl DatabaseBackend for MemoryBackend {
    async fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Deterministic embedder: letter-frequency histogram over a-z. Texts that
/// share words score high; disjoint texts score near zero.
pub struct HashEmbedder;

fn histogram(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(histogram(query))
    }

    async fn embed_passages(&self, passages: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(passages.iter().map(|p| histogram(p)).collect())
    }

    fn dimensions(&self) -> usize {
        26
    }
}

/// An embedder that always fails, for exercising the silent-failure policy.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
        Err(ParleyError::Embedding("model exploded".to_string()))
    }

    async fn embed_passages(&self, _passages: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Err(ParleyError::Embedding("model exploded".to_string()))
    }

    fn dimensions(&self) -> usize {
        26
    }
}

/// Inference connector that replays a scripted sequence of deltas.
pub struct ScriptedConnector {
    script: Vec<Result<TokenDelta>>,
}

impl ScriptedConnector {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            script: tokens
                .iter()
                .map(|t| {
                    Ok(TokenDelta {
                        content: t.to_string(),
                    })
                })
                .collect(),
        }
    }

    pub fn failing_after(tokens: &[&str], error: ParleyError) -> Self {
        let mut script: Vec<Result<TokenDelta>> = tokens
            .iter()
            .map(|t| {
                Ok(TokenDelta {
                    content: t.to_string(),
                })
            })
            .collect();
        script.push(Err(error));
        Self { script }
    }
}

#[async_trait]
impl InferenceConnector for ScriptedConnector {
    async fn chat(
        &self,
        _turns: &[ConversationTurn],
        _options: Option<&ChatOptions>,
    ) -> Result<ChatCompletion> {
        let mut content = String::new();
        for item in &self.script {
            match item {
                Ok(delta) => content.push_str(&delta.content),
                Err(_) => return Err(ParleyError::Llm("scripted failure".to_string())),
            }
        }
        Ok(ChatCompletion {
            content,
            usage: None,
        })
    }

    async fn stream_chat(
        &self,
        _turns: &[ConversationTurn],
        _options: Option<&ChatOptions>,
    ) -> Result<TokenStream> {
        let items: Vec<Result<TokenDelta>> = self
            .script
            .iter()
            .map(|item| match item {
                Ok(delta) => Ok(delta.clone()),
                Err(_) => Err(ParleyError::Llm("scripted failure".to_string())),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Plain in-memory cache backend with inspectable contents.
#[derive(Default)]
pub struct MemoryCache {
    pub entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// In-memory cache that stalls any write whose payload contains a marker,
/// so tests can hold a specific write in flight while later ones land.
pub struct StallingWriteCache {
    pub entries: Mutex<HashMap<String, String>>,
    stall_marker: String,
    stall_for: Duration,
}

impl StallingWriteCache {
    pub fn new(stall_marker: &str, stall_for: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            stall_marker: stall_marker.to_string(),
            stall_for,
        })
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl CacheBackend for StallingWriteCache {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<()> {
        if value.contains(&self.stall_marker) {
            tokio::time::sleep(self.stall_for).await;
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}
