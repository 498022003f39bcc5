//! Redis cache backend.
//!
//! Holds a lazily established multiplexed connection shared across
//! tasks. Redis applies the TTL itself via `SET ... EX`, acting as the
//! shared second cache layer in multi-process deployments.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;

use super::{Cache, CacheError};

pub struct RedisCache {
    client: Client,
    /// Multiplexed connection (shared across tasks)
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
        })
    }

    /// Get the shared connection, establishing it on first use.
    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // Double-check in case another task connected while we waited
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                tracing::info!("Redis cache connection established");
                Ok(conn)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(CacheError::Redis(e))
            }
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: std::time::Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let () = conn.del(key).await?;
        Ok(())
    }
}
