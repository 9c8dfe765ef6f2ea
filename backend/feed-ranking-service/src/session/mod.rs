// ============================================
// Session Dedup Store (会话去重)
// ============================================
//
// Remembers which item ids a viewer has already been served in the current
// browsing session.
//
// Keys (prefix configurable, default "feed"):
// - {prefix}:explore_seen:{viewer_id}   - discovery seen set (short TTL)
// - {prefix}:sent_items:{viewer_id}     - main-feed sent set (~1h TTL)
// - {prefix}:main_feed_seed:{viewer_id} - shuffle seed of the current main-feed session
//
// Reads and appends are not atomic with respect to each other; two concurrent
// page requests from the same viewer may both miss each other's ids.

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value list store with per-key expiry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All ids under `key`; an unknown or expired key yields an empty list.
    async fn get(&self, key: &str) -> Result<Vec<String>>;

    /// Append `ids` to `key` and (re)set its expiry to `ttl`.
    async fn append(&self, key: &str, ids: &[String], ttl: Duration) -> Result<()>;

    async fn clear(&self, key: &str) -> Result<()>;
}

/// Builds the per-viewer session keys.
#[derive(Debug, Clone)]
pub struct SessionKeys {
    prefix: String,
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self::new("feed")
    }
}

impl SessionKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn explore_seen(&self, viewer_id: &str) -> String {
        format!("{}:explore_seen:{}", self.prefix, viewer_id)
    }

    pub fn sent_items(&self, viewer_id: &str) -> String {
        format!("{}:sent_items:{}", self.prefix, viewer_id)
    }

    pub fn main_feed_seed(&self, viewer_id: &str) -> String {
        format!("{}:main_feed_seed:{}", self.prefix, viewer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_viewer_scoped() {
        let keys = SessionKeys::new("feed");
        assert_eq!(keys.explore_seen("v1"), "feed:explore_seen:v1");
        assert_eq!(keys.sent_items("v1"), "feed:sent_items:v1");
        assert_ne!(keys.sent_items("v1"), keys.sent_items("v2"));
        assert_ne!(keys.explore_seen("v1"), keys.sent_items("v1"));
    }
}
