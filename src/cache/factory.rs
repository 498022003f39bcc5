//! Cache backend factory

use std::sync::Arc;

use crate::config::CacheConfig;

use super::memory::MemoryCache;
use super::redis_backend::RedisCache;
use super::Cache;

/// Create a cache backend based on configuration.
///
/// Returns the appropriate backend implementation based on the
/// `backend` setting:
/// - `"redis"`: Returns a `RedisCache` if the client can be created
/// - `"memory"` (default): Returns a `MemoryCache`
pub fn create_cache(config: &CacheConfig) -> Arc<dyn Cache> {
    match config.backend.as_str() {
        "redis" => match RedisCache::new(&config.redis_url) {
            Ok(cache) => {
                tracing::info!(backend = "redis", "Creating Redis cache backend");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Redis cache backend requested but client creation failed, falling back to memory"
                );
                Arc::new(MemoryCache::new())
            }
        },
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory cache backend");
            Arc::new(MemoryCache::new())
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown cache backend, falling back to memory"
            );
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_falls_back_to_memory() {
        let config = CacheConfig {
            backend: "etcd".to_string(),
            ..Default::default()
        };
        // Should not panic; fallback is silent apart from the log
        let _cache = create_cache(&config);
    }
}
