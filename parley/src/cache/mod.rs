mod aside;
mod backend;
mod client;
pub mod keys;

pub use aside::{CacheAside, RetryPolicy};
pub use backend::{CacheBackend, NoOpCacheBackend, RedisCacheBackend};
pub use client::ResilientCache;
