use super::SessionStore;
use crate::error::{FeedError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

/// Redis-backed session store: one list per key, `RPUSH` + `EXPIRE`.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| FeedError::Session(format!("Failed to create Redis client: {}", e)))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| FeedError::Session(format!("Failed to create Redis connection: {}", e)))?;
        Ok(Self { manager })
    }

    /// Ping Redis to check connection health.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                FeedError::Session(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let ids: Vec<String> = conn.lrange(key, 0, -1).await?;
        debug!(key = key, count = ids.len(), "Session ids loaded");
        Ok(ids)
    }

    async fn append(&self, key: &str, ids: &[String], ttl: Duration) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.manager.clone();
        let ttl_secs = ttl.as_secs().max(1) as i64;
        redis::pipe()
            .atomic()
            .rpush(key, ids)
            .ignore()
            .expire(key, ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
