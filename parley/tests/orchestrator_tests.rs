//! Orchestrator state-machine behavior driven through fakes: scripted token
//! streams, an in-memory backend, and an inspectable cache.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use parley::cache::{keys, CacheAside, ResilientCache, RetryPolicy};
use parley::config::CacheConfig;
use parley::db::traits::VectorIndex;
use parley::error::ParleyError;
use parley::knowledge::KnowledgeRetriever;
use parley::llm::InferenceConnector;
use parley::models::{Conversation, ConversationTurn, Role, VectorRecord};
use parley::services::{ChatOrchestrator, ConversationStateStore, ExchangeRequest};

use common::{
    FailingEmbedder, HashEmbedder, MemoryBackend, MemoryCache, ScriptedConnector,
    StallingWriteCache,
};

fn test_cache_config() -> CacheConfig {
    CacheConfig {
        url: "redis://unused".to_string(),
        op_timeout_ms: 250,
        state_ttl_secs: 1800,
        listing_ttl_secs: 120,
        retry_attempts: 1,
        retry_base_delay_ms: 0,
        retry_multiplier: 1.0,
    }
}

fn state_store(
    backend: Arc<MemoryBackend>,
    cache: Arc<MemoryCache>,
) -> ConversationStateStore {
    let resilient = ResilientCache::new(cache, Duration::from_millis(250));
    let aside = CacheAside::new(
        resilient,
        RetryPolicy {
            attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
        },
    );
    ConversationStateStore::new(backend, aside, &test_cache_config())
}

fn orchestrator(
    backend: Arc<MemoryBackend>,
    cache: Arc<MemoryCache>,
    connector: Arc<dyn InferenceConnector>,
    retriever: Option<Arc<KnowledgeRetriever>>,
) -> ChatOrchestrator {
    ChatOrchestrator::new(state_store(backend, cache), connector, retriever, 2)
}

fn request(conversation_id: &str, prompt: &str) -> ExchangeRequest {
    ExchangeRequest {
        conversation_id: conversation_id.to_string(),
        prompt: prompt.to_string(),
        system_override: None,
        options: None,
    }
}

fn seeded_conversation(id: &str) -> Conversation {
    Conversation::new(id.to_string(), "u1".to_string())
}

async fn wait_for_turns(backend: &MemoryBackend, conversation_id: &str, expected: usize) {
    for _ in 0..100 {
        if backend.turn_count(conversation_id) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} persisted turns, found {}",
        backend.turn_count(conversation_id)
    );
}

fn cached_turns(cache: &MemoryCache, conversation_id: &str) -> Vec<ConversationTurn> {
    let raw = cache
        .raw(&keys::conversation_turns(conversation_id))
        .expect("turn cache entry missing");
    serde_json::from_str(&raw).expect("turn cache entry undecodable")
}

#[tokio::test]
async fn streamed_tokens_arrive_in_order_and_exchange_persists() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::new(&["Hel", "lo ", "there"]));
    let orch = orchestrator(backend.clone(), cache.clone(), connector, None);

    let mut stream = orch.stream_exchange(request("c1", "hi"));
    let mut collected = String::new();
    while let Some(item) = stream.next().await {
        collected.push_str(&item.expect("unexpected stream error").content);
    }
    assert_eq!(collected, "Hello there");

    // Durable persistence is spawned, not awaited.
    wait_for_turns(&backend, "c1", 2).await;
    let turns = backend.stored_turns("c1");
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "hi");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Hello there");
}

#[tokio::test]
async fn mid_stream_failure_yields_partial_then_error_and_skips_durable_write() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::failing_after(
        &["par", "tial"],
        ParleyError::Llm("boom".to_string()),
    ));
    let orch = orchestrator(backend.clone(), cache.clone(), connector, None);

    let mut stream = orch.stream_exchange(request("c1", "hi"));
    let mut deltas = Vec::new();
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => deltas.push(delta.content),
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    assert_eq!(deltas, vec!["par", "tial"]);
    assert!(matches!(error, Some(ParleyError::Llm(_))));

    // The final checkpoint captured the partial assistant turn.
    let cached = cached_turns(&cache, "c1");
    let last = cached.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "partial");

    // No durable write for a failed stream.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.turn_count("c1"), 0);
}

#[tokio::test]
async fn unknown_conversation_aborts_before_any_token() {
    let backend = MemoryBackend::new();
    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::new(&["never"]));
    let orch = orchestrator(backend, cache, connector, None);

    let mut stream = orch.stream_exchange(request("missing", "hi"));
    let first = stream.next().await.expect("expected an item");
    assert!(matches!(first, Err(ParleyError::NotFound(_))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn retrieval_failure_skips_augmentation_silently() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::new(&["ok"]));
    let retriever = Arc::new(KnowledgeRetriever::new(
        Arc::new(FailingEmbedder),
        backend.clone(),
        5,
    ));
    let orch = orchestrator(backend.clone(), cache.clone(), connector, Some(retriever));

    let mut stream = orch.stream_exchange(request("c1", "hi"));
    let mut collected = String::new();
    while let Some(item) = stream.next().await {
        collected.push_str(&item.expect("retrieval failure must not surface").content);
    }
    assert_eq!(collected, "ok");

    // No synthesized system turn made it into the final sequence.
    let cached = cached_turns(&cache, "c1");
    assert!(cached.iter().all(|t| t.role != Role::System));
}

#[tokio::test]
async fn augmentation_injects_retrieved_context_as_system_turn() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    backend
        .upsert_vectors(&[VectorRecord::new(
            "v1".to_string(),
            "c1".to_string(),
            0,
            "zebra migration patterns".to_string(),
            vec![1.0; 26],
        )])
        .await
        .unwrap();

    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::new(&["ok"]));
    let retriever = Arc::new(KnowledgeRetriever::new(
        Arc::new(HashEmbedder),
        backend.clone(),
        5,
    ));
    let orch = orchestrator(backend.clone(), cache.clone(), connector, Some(retriever));

    let mut stream = orch.stream_exchange(request("c1", "tell me about zebras"));
    while let Some(item) = stream.next().await {
        item.expect("stream should succeed");
    }

    let cached = cached_turns(&cache, "c1");
    let system_turn = cached
        .iter()
        .find(|t| t.role == Role::System)
        .expect("expected a synthesized system turn");
    assert!(system_turn.content.contains("zebra migration patterns"));
}

#[tokio::test]
async fn slow_mid_stream_checkpoint_cannot_clobber_final_state() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    // Hold the checkpoint write (partial content "alpha beta ") in flight
    // well past the end of the stream; the finalizing save must still win.
    let cache = StallingWriteCache::new("alpha beta \"", Duration::from_millis(100));
    let resilient = ResilientCache::new(cache.clone(), Duration::from_millis(500));
    let aside = CacheAside::new(
        resilient,
        RetryPolicy {
            attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
        },
    );
    let store = ConversationStateStore::new(backend.clone(), aside, &test_cache_config());
    let connector = Arc::new(ScriptedConnector::new(&["alpha ", "beta ", "gamma"]));
    let orch = ChatOrchestrator::new(store, connector, None, 2);

    let mut stream = orch.stream_exchange(request("c1", "hi"));
    while let Some(item) = stream.next().await {
        item.expect("stream should succeed");
    }

    let raw = cache
        .raw(&keys::conversation_turns("c1"))
        .expect("turn cache entry missing");
    let cached: Vec<ConversationTurn> =
        serde_json::from_str(&raw).expect("turn cache entry undecodable");
    let last = cached.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "alpha beta gamma");
}

#[tokio::test]
async fn complete_exchange_returns_full_content_and_persists() {
    let backend = MemoryBackend::with_conversation(seeded_conversation("c1"));
    let cache = MemoryCache::new();
    let connector = Arc::new(ScriptedConnector::new(&["all ", "at ", "once"]));
    let orch = orchestrator(backend.clone(), cache.clone(), connector, None);

    let completion = orch
        .complete_exchange(request("c1", "hi"))
        .await
        .expect("exchange should succeed");
    assert_eq!(completion.content, "all at once");

    wait_for_turns(&backend, "c1", 2).await;
    assert_eq!(backend.stored_turns("c1")[1].content, "all at once");
}
