use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheAside, CacheBackend, ResilientCache};
use crate::config::Config;
use crate::db::traits::DatabaseBackend;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::knowledge::{KnowledgeIndexer, KnowledgeRetriever, WindowChunker};
use crate::llm::{InferenceConnector, LlmProvider};
use crate::services::{ChatOrchestrator, ConversationStateStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub cache: ResilientCache,
    pub state_store: ConversationStateStore,
    pub orchestrator: ChatOrchestrator,
    pub indexer: Arc<KnowledgeIndexer>,
    pub retriever: Option<Arc<KnowledgeRetriever>>,
    pub llm: LlmProvider,
}

impl AppState {
    pub fn new<B>(
        config: Config,
        backend: Arc<B>,
        cache_backend: Arc<dyn CacheBackend>,
        embedder: Arc<dyn Embedder>,
        llm: LlmProvider,
    ) -> Result<Self>
    where
        B: DatabaseBackend + 'static,
    {
        let config = Arc::new(config);

        let cache = ResilientCache::new(
            cache_backend,
            Duration::from_millis(config.cache.op_timeout_ms),
        );
        let cache_aside = CacheAside::from_config(cache.clone(), &config.cache);

        let state_store =
            ConversationStateStore::new(backend.clone(), cache_aside, &config.cache);

        let chunker = WindowChunker::new(&config.processing)?;
        let indexer = Arc::new(KnowledgeIndexer::new(
            chunker,
            embedder.clone(),
            backend.clone(),
        ));

        let retriever = if config.retrieval.enabled {
            Some(Arc::new(KnowledgeRetriever::new(
                embedder,
                backend.clone(),
                config.retrieval.top_k,
            )))
        } else {
            None
        };

        let connector: Arc<dyn InferenceConnector> = Arc::new(llm.clone());
        let orchestrator = ChatOrchestrator::new(
            state_store.clone(),
            connector,
            retriever.clone(),
            config.chat.checkpoint_every,
        );

        Ok(Self {
            config,
            db: backend,
            cache,
            state_store,
            orchestrator,
            indexer,
            retriever,
            llm,
        })
    }
}
