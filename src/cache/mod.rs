//! Key-value cache with TTL, used read-through/write-invalidate by the
//! course service.
//!
//! Values are serialized JSON strings so backends stay byte-oriented
//! and interchangeable. The memory backend is the default; Redis is
//! available as the shared second layer.

mod factory;
mod memory;
mod redis_backend;

pub use factory::create_cache;
pub use memory::MemoryCache;
pub use redis_backend::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value; `Ok(None)` on miss or expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Drop a key. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}
