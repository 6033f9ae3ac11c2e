use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::ResilientCache;
use crate::config::CacheConfig;
use crate::error::Result;

/// Bounded exponential backoff: `attempts` tries, delay before try `k`
/// (zero-based, after the first) of `base * multiplier^(k-1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        self.base_delay.mul_f64(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }
}

/// Generic get-or-compute-and-cache helper. The cache is never load-bearing:
/// a broken cache degrades to computing from source, a broken source always
/// propagates.
#[derive(Clone)]
pub struct CacheAside {
    cache: ResilientCache,
    retry: RetryPolicy,
}

impl CacheAside {
    pub fn new(cache: ResilientCache, retry: RetryPolicy) -> Self {
        Self { cache, retry }
    }

    pub fn from_config(cache: ResilientCache, config: &CacheConfig) -> Self {
        Self::new(
            cache,
            RetryPolicy {
                attempts: config.retry_attempts,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                multiplier: config.retry_multiplier,
            },
        )
    }

    pub fn cache(&self) -> &ResilientCache {
        &self.cache
    }

    /// On a hit, return the cached value. On a miss, compute from source and
    /// write back best-effort (a failed write-back is logged and swallowed).
    /// On a cache *error*, bypass the cache and compute from source inside
    /// the bounded retry loop; when the retries are exhausted the source
    /// error propagates unchanged.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl_secs: u64, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                let value = compute().await?;
                if let Err(e) = self.cache.set(key, &value, ttl_secs).await {
                    tracing::warn!(key, error = %e, "Cache write-back failed; serving computed value");
                }
                return Ok(value);
            }
            Err(e) if e.is_cache_error() => {
                tracing::warn!(key, error = %e, "Cache read failed; falling back to source");
            }
            Err(e) => return Err(e),
        }

        self.compute_with_retry(compute).await
    }

    /// Best-effort point delete. Connectivity failures are swallowed (the
    /// entry still expires by TTL); anything unexpected is rethrown.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        match self.cache.remove(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cache_connectivity_error() => {
                tracing::warn!(key, error = %e, "Cache invalidation skipped; entry expires by TTL");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn compute_with_retry<T, F, Fut>(&self, compute: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match compute().await {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }

        // attempts >= 1, so at least one iteration ran
        Err(last_error.expect("retry loop ran at least once"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::cache::client::test_support::{DownCacheBackend, MemoryCacheBackend};
    use crate::cache::ResilientCache;
    use crate::error::ParleyError;

    fn aside_over(backend: Arc<dyn crate::cache::CacheBackend>) -> CacheAside {
        let cache = ResilientCache::new(backend, Duration::from_millis(100));
        CacheAside::new(
            cache,
            RetryPolicy {
                attempts: 3,
                base_delay: Duration::from_millis(1),
                multiplier: 2.0,
            },
        )
    }

    #[test]
    fn retry_delays_grow_exponentially() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before(2), Duration::from_millis(200));
        assert_eq!(policy.delay_before(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn hit_skips_compute() {
        let backend = Arc::new(MemoryCacheBackend::default());
        let aside = aside_over(backend.clone());
        aside.cache().set("k", &"cached".to_string(), 60).await.unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let value: String = aside
            .get_or_set("k", 60, move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("computed".to_string())
                }
            })
            .await
            .expect("get_or_set");

        assert_eq!(value, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_computes_and_writes_back() {
        let backend = Arc::new(MemoryCacheBackend::default());
        let aside = aside_over(backend.clone());

        let value: String = aside
            .get_or_set("k", 60, || async { Ok("computed".to_string()) })
            .await
            .expect("get_or_set");
        assert_eq!(value, "computed");

        // second call is a hit now
        let cached: Option<String> = aside.cache().get("k").await.expect("get");
        assert_eq!(cached, Some("computed".to_string()));
    }

    #[tokio::test]
    async fn unavailable_cache_returns_exactly_compute_result() {
        let aside = aside_over(Arc::new(DownCacheBackend));

        let value: String = aside
            .get_or_set("k", 60, || async { Ok("from-source".to_string()) })
            .await
            .expect("get_or_set");
        assert_eq!(value, "from-source");
    }

    #[tokio::test]
    async fn source_error_propagates_after_retries() {
        let aside = aside_over(Arc::new(DownCacheBackend));

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let err = aside
            .get_or_set::<String, _, _>("k", 60, move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ParleyError::NotFound("conv_1".into()))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ParleyError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "bounded retry, then give up");
    }

    #[tokio::test]
    async fn transient_source_error_recovers_within_retry_budget() {
        let aside = aside_over(Arc::new(DownCacheBackend));

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let value: String = aside
            .get_or_set("k", 60, move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ParleyError::Internal("transient".into()))
                    } else {
                        Ok("eventually".to_string())
                    }
                }
            })
            .await
            .expect("get_or_set");

        assert_eq!(value, "eventually");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn miss_with_failing_source_propagates_immediately() {
        let backend = Arc::new(MemoryCacheBackend::default());
        let aside = aside_over(backend);

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let err = aside
            .get_or_set::<String, _, _>("k", 60, move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ParleyError::NotFound("conv_1".into()))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ParleyError::NotFound(_)));
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "a plain miss is not the cache-error fallback path"
        );
    }

    #[tokio::test]
    async fn invalidate_swallows_connectivity_errors() {
        let aside = aside_over(Arc::new(DownCacheBackend));
        aside.invalidate("k").await.expect("invalidate should swallow");
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let backend = Arc::new(MemoryCacheBackend::default());
        let aside = aside_over(backend.clone());
        aside.cache().set("k", &1u32, 60).await.unwrap();

        aside.invalidate("k").await.expect("invalidate");
        assert!(!backend.entries.lock().unwrap().contains_key("k"));
    }
}
