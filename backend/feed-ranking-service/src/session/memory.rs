use super::SessionStore;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    ids: Vec<String>,
    expires_at: Instant,
}

/// In-process session store. Expired keys are dropped on read and pruned on append.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Entry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(entry.ids.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(Vec::new())
    }

    async fn append(&self, key: &str, ids: &[String], ttl: Duration) -> Result<()> {
        let now = Instant::now();
        self.entries
            .retain(|k, entry| k == key || entry.expires_at > now);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            ids: Vec::new(),
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.ids.clear();
        }
        entry.ids.extend(ids.iter().cloned());
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
