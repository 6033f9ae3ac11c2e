use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parley::api::{create_router, AppState};
use parley::cache::{CacheBackend, NoOpCacheBackend, RedisCacheBackend};
use parley::config::Config;
use parley::db::{Database, LibSqlBackend};
use parley::embeddings::{Embedder, EmbeddingProvider};
use parley::llm::LlmProvider;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Conversation orchestration engine for AI chat backends")]
struct Args {
    /// Run without the distributed cache (every read hits the database)
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database, config.embeddings.dimensions).await?;
    let backend = Arc::new(LibSqlBackend::new(raw_db));

    let cache_backend: Arc<dyn CacheBackend> = if args.no_cache {
        tracing::info!("Cache disabled via --no-cache");
        Arc::new(NoOpCacheBackend)
    } else {
        match RedisCacheBackend::connect(&config.cache.url).await {
            Ok(redis) => {
                tracing::info!("Connected to cache at {}", config.cache.url);
                Arc::new(redis)
            }
            Err(error) => {
                tracing::warn!(%error, "Cache unreachable at startup - running without cache");
                Arc::new(NoOpCacheBackend)
            }
        }
    };

    tracing::info!("Loading embedding model: {}...", config.embeddings.model);
    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProvider::new(&config.embeddings)?);

    if let Some(llm_config) = &config.llm {
        tracing::info!("Initializing LLM provider: {}...", llm_config.model);
    }
    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - chat endpoints will return 501");
    }

    let state = AppState::new(config.clone(), backend, cache_backend, embedder, llm)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Parley starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
