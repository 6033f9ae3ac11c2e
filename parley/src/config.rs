use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub embeddings: EmbeddingsConfig,
    pub processing: ProcessingConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// Distributed cache settings. The cache is an optimization layer only:
/// every entry is disposable and correctness holds with none present.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub url: String,
    /// Per-operation budget, raced against every cache call.
    pub op_timeout_ms: u64,
    /// TTL for cached turn sequences.
    pub state_ttl_secs: u64,
    /// TTL for list/search result caches.
    pub listing_ttl_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// When false, prompts are never augmented with retrieved context.
    pub enabled: bool,
    pub top_k: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Dispatch a best-effort cache checkpoint every N streamed tokens.
    pub checkpoint_every: usize,
}

/// LLM configuration for the inference connector.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("PARLEY_PORT", 3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:parley.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            cache: CacheConfig {
                url: env::var("CACHE_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                op_timeout_ms: parse_env_or("CACHE_OP_TIMEOUT_MS", 250),
                state_ttl_secs: parse_env_or("CACHE_STATE_TTL_SECS", 1800),
                listing_ttl_secs: parse_env_or("CACHE_LISTING_TTL_SECS", 120),
                retry_attempts: parse_env_or("CACHE_RETRY_ATTEMPTS", 3),
                retry_base_delay_ms: parse_env_or("CACHE_RETRY_BASE_DELAY_MS", 100),
                retry_multiplier: parse_env_or("CACHE_RETRY_MULTIPLIER", 2.0),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "BAAI/bge-small-en-v1.5".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 256),
            },
            processing: ProcessingConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 500),
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 50),
            },
            retrieval: RetrievalConfig {
                enabled: parse_env_or("RETRIEVAL_ENABLED", true),
                top_k: parse_env_or("RETRIEVAL_TOP_K", 5),
            },
            chat: ChatConfig {
                checkpoint_every: parse_env_or("CHAT_CHECKPOINT_EVERY", 25),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 60),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known LLM providers that use OpenAI-compatible APIs.
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to treating the whole string as a local model
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cache_config_defaults() {
        std::env::remove_var("CACHE_OP_TIMEOUT_MS");
        std::env::remove_var("CACHE_STATE_TTL_SECS");

        let config = Config::default();
        assert_eq!(config.cache.op_timeout_ms, 250);
        assert_eq!(config.cache.state_ttl_secs, 1800);
        assert_eq!(config.cache.retry_attempts, 3);
        assert_eq!(config.cache.retry_base_delay_ms, 100);
        assert_eq!(config.cache.retry_multiplier, 2.0);
    }

    #[test]
    #[serial]
    fn test_cache_config_from_env() {
        std::env::set_var("CACHE_OP_TIMEOUT_MS", "75");
        std::env::set_var("CACHE_STATE_TTL_SECS", "600");

        let config = Config::default();
        assert_eq!(config.cache.op_timeout_ms, 75);
        assert_eq!(config.cache.state_ttl_secs, 600);

        std::env::remove_var("CACHE_OP_TIMEOUT_MS");
        std::env::remove_var("CACHE_STATE_TTL_SECS");
    }

    #[test]
    #[serial]
    fn test_processing_config_defaults() {
        std::env::remove_var("CHUNK_SIZE");
        std::env::remove_var("CHUNK_OVERLAP");

        let config = Config::default();
        assert_eq!(config.processing.chunk_size, 500);
        assert_eq!(config.processing.chunk_overlap, 50);
    }

    #[test]
    #[serial]
    fn test_llm_config_absent_without_model() {
        std::env::remove_var("LLM_MODEL");

        let config = Config::default();
        assert!(config.llm.is_none());

        std::env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        let config = Config::default();
        let llm = config.llm.expect("llm config");
        assert_eq!(llm.model, "openai/gpt-4o-mini");
        assert_eq!(llm.timeout_secs, 60);
        assert_eq!(llm.max_retries, 3);

        std::env::remove_var("LLM_MODEL");
    }

    #[test]
    fn test_parse_llm_provider_model_known_prefix() {
        assert_eq!(
            parse_llm_provider_model("openai/gpt-4o-mini"),
            ("openai", "gpt-4o-mini")
        );
        assert_eq!(
            parse_llm_provider_model("ollama/llama3"),
            ("ollama", "llama3")
        );
    }

    #[test]
    fn test_parse_llm_provider_model_unknown_prefix_is_local() {
        assert_eq!(
            parse_llm_provider_model("mycorp/private-model"),
            ("local", "mycorp/private-model")
        );
        assert_eq!(parse_llm_provider_model("llama3"), ("local", "llama3"));
    }

    #[test]
    #[serial]
    fn test_parse_env_or_invalid_value_falls_back() {
        std::env::set_var("__TEST_PARLEY_PORT", "not-a-number");
        let result: u16 = parse_env_or("__TEST_PARLEY_PORT", 3000);
        assert_eq!(result, 3000);
        std::env::remove_var("__TEST_PARLEY_PORT");
    }
}
