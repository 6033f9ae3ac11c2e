use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{ParleyError, Result};

/// Raw string-keyed operations against a distributed cache. Payloads are
/// serialized upstream; a backend only moves strings. Implementations must be
/// cheap to clone and safe to share across tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Liveness probe. Fails with [`ParleyError::CacheConnection`] when the
    /// backend is unreachable.
    async fn ping(&self) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, payload: &str, ttl_secs: u64) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Redis over a multiplexed [`ConnectionManager`]: one long-lived handle,
/// reconnection handled internally, safe to clone per call.
#[derive(Clone)]
pub struct RedisCacheBackend {
    manager: ConnectionManager,
}

impl RedisCacheBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ParleyError::CacheConnection(format!("invalid cache url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ParleyError::CacheConnection(e.to_string()))?;
        Ok(Self { manager })
    }

    fn map_error(op: &'static str, key: &str, error: redis::RedisError) -> ParleyError {
        if error.is_connection_refusal() || error.is_io_error() || error.is_timeout() {
            ParleyError::CacheConnection(error.to_string())
        } else {
            ParleyError::CacheOperation {
                op,
                key: key.to_string(),
                detail: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| ParleyError::CacheConnection(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| Self::map_error("get", key, e))
    }

    async fn set(&self, key: &str, payload: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, payload, ttl_secs)
            .await
            .map_err(|e| Self::map_error("set", key, e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| Self::map_error("remove", key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        conn.exists(key)
            .await
            .map_err(|e| Self::map_error("exists", key, e))
    }
}

/// Always-miss, always-succeed backend. Used when the cache is disabled or
/// unreachable at startup: every read falls through to the source of truth and
/// every write is discarded.
#[derive(Clone, Default)]
pub struct NoOpCacheBackend;

#[async_trait]
impl CacheBackend for NoOpCacheBackend {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _payload: &str, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_backend_always_misses_and_never_fails() {
        let backend = NoOpCacheBackend;
        backend.ping().await.expect("ping");
        backend.set("k", "v", 60).await.expect("set");
        assert_eq!(backend.get("k").await.expect("get"), None);
        assert!(!backend.exists("k").await.expect("exists"));
        backend.remove("k").await.expect("remove");
    }
}
