use super::{observe, FeedService};
use crate::error::Result;
use crate::models::{ContentItem, FeedPage};
use crate::utils::shuffle_key;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

impl FeedService {
    /// Chronological main feed, paged by one-based page index.
    ///
    /// Page 1 starts a session: it forgets what was sent, draws a new shuffle
    /// seed and leads with items from the fresh window. Later pages continue
    /// through the older bucket in the order fixed by that seed. No scoring.
    pub async fn get_main_feed(&self, viewer_id: &str, page: usize, limit: usize) -> Result<FeedPage> {
        let started = Instant::now();
        let result = self.main_feed(viewer_id, page, limit).await;
        observe("main", started, &result);
        result
    }

    async fn main_feed(&self, viewer_id: &str, page: usize, limit: usize) -> Result<FeedPage> {
        let first_page = page <= 1;
        let sent_key = self.keys.sent_items(viewer_id);
        let track_session = !viewer_id.is_empty();

        let sent: Vec<String> = if track_session && !first_page {
            self.session_ids(&sent_key).await
        } else {
            Vec::new()
        };
        if track_session && first_page {
            self.session_clear(&sent_key).await;
        }
        let seed = self.session_seed(viewer_id, first_page).await;

        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.fresh_window_secs);
        let pool_limit = self.config.main_feed_pool_limit;

        let fresh: Vec<ContentItem> = if first_page {
            self.primary(self.deps.content.find_created_after(cutoff, &sent, pool_limit))
                .await?
        } else {
            Vec::new()
        };

        let excluded: HashSet<&str> = sent
            .iter()
            .map(String::as_str)
            .chain(fresh.iter().map(|item| item.id.as_str()))
            .collect();
        let mut older: Vec<ContentItem> = self
            .primary(self.deps.content.find_created_before(cutoff, pool_limit))
            .await?
            .into_iter()
            .filter(|item| !excluded.contains(item.id.as_str()))
            .collect();
        older.sort_by_cached_key(|item| (shuffle_key(seed, &item.id), item.id.clone()));

        let fresh_count = fresh.len();
        let older_count = older.len();
        let mut combined = fresh;
        combined.extend(older);

        let has_next_page = combined.len() > limit;
        combined.truncate(limit);

        if track_session {
            let sent_now: Vec<String> = combined.iter().map(|item| item.id.clone()).collect();
            self.session_append(&sent_key, &sent_now, self.config.sent_ttl())
                .await;
        }

        info!(
            viewer_id = %viewer_id,
            page,
            fresh = fresh_count,
            older = older_count,
            already_sent = sent.len(),
            returned = combined.len(),
            has_next_page,
            "Main feed served"
        );

        let items = self
            .annotate(viewer_id, combined.into_iter().map(|item| (item, None)).collect())
            .await;

        Ok(FeedPage {
            items,
            has_next_page,
        })
    }

    /// Shuffle seed of the viewer's current main-feed session. A new session
    /// (or a lost seed) draws a fresh one and stores it for later pages.
    async fn session_seed(&self, viewer_id: &str, new_session: bool) -> u64 {
        if viewer_id.is_empty() {
            return rand::random();
        }
        let key = self.keys.main_feed_seed(viewer_id);

        if !new_session {
            let stored = self.session_ids(&key).await;
            if let Some(seed) = stored.first().and_then(|raw| raw.parse::<u64>().ok()) {
                return seed;
            }
            debug!(viewer_id = %viewer_id, "Main feed seed missing, starting a new order");
        }

        let seed: u64 = rand::random();
        self.session_clear(&key).await;
        self.session_append(&key, &[seed.to_string()], self.config.sent_ttl())
            .await;
        seed
    }
}
