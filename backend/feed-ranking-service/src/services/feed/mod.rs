//! Feed assemblers: related items, discovery and main feed.
//!
//! Each operation is one stateless pass over injected accessors. Only the
//! primary content store can fail a call; every other dependency degrades.

mod discovery;
mod main_feed;
mod related;

use crate::config::RankingConfig;
use crate::error::{FeedError, Result};
use crate::metrics;
use crate::models::{ContentItem, InteractionType, RankedItem};
use crate::services::trending::TrendingSettings;
use crate::services::{DiversityLayer, RankingLayer, RecallLayer, TrendingCache};
use crate::session::{SessionKeys, SessionStore};
use crate::store::{ContentStore, InteractionIndex, ViewerProfileStore};
use crate::utils::with_deadline;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Accessors the feed service is built from.
#[derive(Clone)]
pub struct FeedDependencies {
    pub content: Arc<dyn ContentStore>,
    pub viewers: Arc<dyn ViewerProfileStore>,
    pub interactions: Arc<dyn InteractionIndex>,
    pub sessions: Arc<dyn SessionStore>,
}

pub struct FeedService {
    deps: FeedDependencies,
    config: RankingConfig,
    keys: SessionKeys,
    related_recall: RecallLayer,
    discovery_recall: RecallLayer,
    ranking: RankingLayer,
    diversity: DiversityLayer,
}

impl FeedService {
    pub fn new(deps: FeedDependencies, config: RankingConfig, keys: SessionKeys) -> Self {
        let trending = Arc::new(TrendingCache::new(
            Arc::clone(&deps.content),
            TrendingSettings {
                min_engagement: config.trending_min_engagement,
                window: chrono::Duration::hours(config.trending_window_hours),
                capacity: config
                    .related_trending_limit
                    .max(config.discovery_trending_limit),
                ttl: config.trending_cache_ttl(),
            },
        ));

        let related_recall =
            RecallLayer::related(Arc::clone(&deps.content), Arc::clone(&trending), &config);
        let discovery_recall =
            RecallLayer::discovery(Arc::clone(&deps.content), Arc::clone(&trending), &config);
        let diversity = DiversityLayer::new(
            config.diversity_max_per_owner,
            config.diversity_max_items,
            config.diversity_min_fill,
        );

        Self {
            deps,
            config,
            keys,
            related_recall,
            discovery_recall,
            ranking: RankingLayer::new(),
            diversity,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Runs a primary-store call under the source deadline. Any failure here
    /// means the content store cannot serve this request.
    async fn primary<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.config.source_timeout(), future)
            .await
            .map_err(|e| FeedError::StoreUnavailable(e.to_string()))
    }

    async fn followed_owner_ids(&self, viewer_id: &str) -> Vec<String> {
        if viewer_id.is_empty() {
            return Vec::new();
        }
        let lookup = self
            .deps
            .viewers
            .find_followed_owner_ids(viewer_id, self.config.following_lookup_limit);
        match with_deadline(self.config.source_timeout(), lookup).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(viewer_id = %viewer_id, error = %e, "Following lookup failed, continuing without it");
                Vec::new()
            }
        }
    }

    async fn interest_tags(&self, viewer_id: &str) -> Vec<String> {
        if viewer_id.is_empty() {
            return Vec::new();
        }
        let lookup = self
            .deps
            .viewers
            .find_top_interest_tags(viewer_id, self.config.interest_tag_count);
        match with_deadline(self.config.source_timeout(), lookup).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(viewer_id = %viewer_id, error = %e, "Interest lookup failed, continuing without it");
                Vec::new()
            }
        }
    }

    /// Session reads degrade to an empty list.
    async fn session_ids(&self, key: &str) -> Vec<String> {
        match with_deadline(self.config.source_timeout(), self.deps.sessions.get(key)).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(key = %key, error = %e, "Session read failed, treating as empty");
                Vec::new()
            }
        }
    }

    async fn session_append(&self, key: &str, ids: &[String], ttl: Duration) {
        if ids.is_empty() {
            return;
        }
        let append = self.deps.sessions.append(key, ids, ttl);
        if let Err(e) = with_deadline(self.config.source_timeout(), append).await {
            warn!(key = %key, count = ids.len(), error = %e, "Session append failed");
        }
    }

    async fn session_clear(&self, key: &str) {
        if let Err(e) = with_deadline(self.config.source_timeout(), self.deps.sessions.clear(key)).await
        {
            warn!(key = %key, error = %e, "Session clear failed");
        }
    }

    /// Attaches `liked`/`saved` for the viewer. Index failures leave both false.
    async fn annotate(
        &self,
        viewer_id: &str,
        items: Vec<(ContentItem, Option<f64>)>,
    ) -> Vec<RankedItem> {
        let interacted = if viewer_id.is_empty() || items.is_empty() {
            HashMap::new()
        } else {
            let ids: Vec<String> = items.iter().map(|(item, _)| item.id.clone()).collect();
            let lookup = self.deps.interactions.find_interacted_types(
                viewer_id,
                &ids,
                &[InteractionType::Like, InteractionType::Save],
            );
            match with_deadline(self.config.source_timeout(), lookup).await {
                Ok(map) => map,
                Err(e) => {
                    warn!(viewer_id = %viewer_id, error = %e, "Interaction lookup failed, flags default to false");
                    HashMap::new()
                }
            }
        };

        items
            .into_iter()
            .map(|(item, score)| {
                let types = interacted.get(&item.id);
                let has = |t: InteractionType| types.map(|set| set.contains(&t)).unwrap_or(false);
                RankedItem {
                    liked: has(InteractionType::Like),
                    saved: has(InteractionType::Save),
                    score,
                    item,
                }
            })
            .collect()
    }
}

fn observe<T>(feed: &'static str, started: Instant, result: &Result<T>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) if e.is_retryable() => "unavailable",
        Err(_) => "error",
    };
    metrics::record_request(feed, status);
    metrics::record_duration(feed, started.elapsed());
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::store::MemoryStore;
    use chrono::Utc;

    pub fn service(store: &Arc<MemoryStore>, sessions: &Arc<MemorySessionStore>) -> FeedService {
        FeedService::new(
            FeedDependencies {
                content: store.clone(),
                viewers: store.clone(),
                interactions: store.clone(),
                sessions: sessions.clone(),
            },
            RankingConfig::default(),
            SessionKeys::default(),
        )
    }

    pub fn item(id: &str, owner: &str, tags: &[&str], age: chrono::Duration) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc::now() - age,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            likes: 0,
            saves: 0,
            comments: 0,
            views: 0,
        }
    }
}
