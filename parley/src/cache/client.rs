use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheBackend;
use crate::error::{ParleyError, Result};

/// Typed façade over a [`CacheBackend`]. Every operation probes liveness
/// first, then races the backend call against a configured budget: the first
/// to resolve wins, and a lost race cancels the operation and fails with
/// [`ParleyError::CacheTimeout`]. A miss is a normal `Ok(None)`, never an
/// error; an entry that exists but does not decode is
/// [`ParleyError::CacheSerialization`], distinct from a miss.
#[derive(Clone)]
pub struct ResilientCache {
    backend: Arc<dyn CacheBackend>,
    op_timeout: Duration,
}

impl ResilientCache {
    pub fn new(backend: Arc<dyn CacheBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let payload = self
            .run_op(key, self.backend.get(key))
            .await?;

        match payload {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ParleyError::CacheSerialization {
                    key: key.to_string(),
                    detail: e.to_string(),
                }),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let payload = serde_json::to_string(value).map_err(|e| ParleyError::CacheSerialization {
            key: key.to_string(),
            detail: e.to_string(),
        })?;

        self.run_op(key, self.backend.set(key, &payload, ttl_secs))
            .await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.run_op(key, self.backend.remove(key)).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.run_op(key, self.backend.exists(key)).await
    }

    /// Probe liveness, then race the operation against the timeout. Dropping
    /// the future on timeout cancels the in-flight backend call.
    async fn run_op<T>(
        &self,
        key: &str,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let guarded = async {
            self.backend.ping().await?;
            op.await
        };

        match tokio::time::timeout(self.op_timeout, guarded).await {
            Ok(result) => result,
            Err(_) => Err(ParleyError::CacheTimeout {
                key: key.to_string(),
                threshold_ms: self.op_timeout.as_millis() as u64,
            }),
        }
    }
}
