//! Process-wide cache of globally trending items.
//!
//! Trending is viewer-independent, so one list serves every request until its
//! TTL runs out. A failed refresh keeps serving the stale list when there is one.

use crate::error::Result;
use crate::models::ContentItem;
use crate::store::ContentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TrendingSettings {
    pub min_engagement: f64,
    pub window: chrono::Duration,
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for TrendingSettings {
    fn default() -> Self {
        Self {
            min_engagement: 20.0,
            window: chrono::Duration::hours(168),
            capacity: 50,
            ttl: Duration::from_secs(60),
        }
    }
}

struct Snapshot {
    items: Arc<Vec<ContentItem>>,
    fetched_at: Instant,
}

pub struct TrendingCache {
    store: Arc<dyn ContentStore>,
    settings: TrendingSettings,
    snapshot: RwLock<Option<Snapshot>>,
}

impl TrendingCache {
    pub fn new(store: Arc<dyn ContentStore>, settings: TrendingSettings) -> Self {
        Self {
            store,
            settings,
            snapshot: RwLock::new(None),
        }
    }

    /// Current trending list, most engaged first.
    pub async fn get(&self) -> Result<Arc<Vec<ContentItem>>> {
        {
            let guard = self.snapshot.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.fetched_at.elapsed() < self.settings.ttl {
                    debug!(count = snapshot.items.len(), "Trending cache hit");
                    return Ok(Arc::clone(&snapshot.items));
                }
            }
        }

        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<Arc<Vec<ContentItem>>> {
        let mut guard = self.snapshot.write().await;

        // Another request may have refreshed while we waited for the lock.
        if let Some(snapshot) = guard.as_ref() {
            if snapshot.fetched_at.elapsed() < self.settings.ttl {
                return Ok(Arc::clone(&snapshot.items));
            }
        }

        let since = Utc::now() - self.settings.window;
        match self
            .store
            .find_trending(self.settings.min_engagement, since, self.settings.capacity)
            .await
        {
            Ok(items) => {
                info!(count = items.len(), "Trending cache refreshed");
                let items = Arc::new(items);
                *guard = Some(Snapshot {
                    items: Arc::clone(&items),
                    fetched_at: Instant::now(),
                });
                Ok(items)
            }
            Err(e) => match guard.as_mut() {
                Some(stale) => {
                    warn!(error = %e, "Trending refresh failed, serving stale list");
                    // Hold the stale list for another TTL instead of retrying per request.
                    stale.fetched_at = Instant::now();
                    Ok(Arc::clone(&stale.items))
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::store::MockContentStore;

    fn item(id: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            created_at: Utc::now(),
            tags: vec![],
            likes: 50,
            saves: 0,
            comments: 0,
            views: 0,
        }
    }

    #[tokio::test]
    async fn test_second_read_within_ttl_hits_cache() {
        let mut store = MockContentStore::new();
        store
            .expect_find_trending()
            .times(1)
            .returning(|_, _, _| Ok(vec![item("t1"), item("t2")]));

        let cache = TrendingCache::new(Arc::new(store), TrendingSettings::default());
        assert_eq!(cache.get().await.unwrap().len(), 2);
        assert_eq!(cache.get().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_list() {
        let mut store = MockContentStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_find_trending()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![item("t1")]));
        store
            .expect_find_trending()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(FeedError::Database("connection refused".into())));

        let settings = TrendingSettings {
            ttl: Duration::from_millis(0),
            ..TrendingSettings::default()
        };
        let cache = TrendingCache::new(Arc::new(store), settings);
        assert_eq!(cache.get().await.unwrap()[0].id, "t1");

        let stale = cache.get().await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "t1");
    }

    #[tokio::test]
    async fn test_stale_list_is_held_after_failed_refresh() {
        let mut store = MockContentStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_find_trending()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![item("t1")]));
        store
            .expect_find_trending()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(FeedError::Database("connection refused".into())));

        let settings = TrendingSettings {
            ttl: Duration::from_millis(50),
            ..TrendingSettings::default()
        };
        let cache = TrendingCache::new(Arc::new(store), settings);
        assert_eq!(cache.get().await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get().await.unwrap()[0].id, "t1");

        // Served from the held snapshot; a third store call would break the mock.
        for _ in 0..5 {
            assert_eq!(cache.get().await.unwrap()[0].id, "t1");
        }
    }

    #[tokio::test]
    async fn test_failed_first_refresh_is_an_error() {
        let mut store = MockContentStore::new();
        store
            .expect_find_trending()
            .returning(|_, _, _| Err(FeedError::Database("down".into())));

        let cache = TrendingCache::new(Arc::new(store), TrendingSettings::default());
        assert!(cache.get().await.is_err());
    }
}
