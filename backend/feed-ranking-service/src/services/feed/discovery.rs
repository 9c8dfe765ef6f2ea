use super::{observe, FeedService};
use crate::error::Result;
use crate::models::{CandidateSource, FeedPage};
use crate::services::pagination::paginate_by_offset;
use crate::services::ranking::ScoringContext;
use crate::services::recall::RecallContext;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;
use tracing::info;

impl FeedService {
    /// Interest-driven discovery feed, paged by zero-based page index.
    ///
    /// Page 0 starts a new session and forgets what was served before. Served
    /// ids go into the viewer's seen set so later pages skip them.
    pub async fn get_discovery_feed(
        &self,
        viewer_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<FeedPage> {
        let started = Instant::now();
        let result = self.discovery_feed(viewer_id, page, limit).await;
        observe("discovery", started, &result);
        result
    }

    async fn discovery_feed(&self, viewer_id: &str, page: usize, limit: usize) -> Result<FeedPage> {
        let seen_key = self.keys.explore_seen(viewer_id);
        let track_session = !viewer_id.is_empty();

        if track_session && page == 0 {
            self.session_clear(&seen_key).await;
        }

        let seen: HashSet<String> = if track_session && page > 0 {
            self.session_ids(&seen_key).await.into_iter().collect()
        } else {
            HashSet::new()
        };

        let (interest_tags, followed_owner_ids) = futures::join!(
            self.interest_tags(viewer_id),
            self.followed_owner_ids(viewer_id)
        );

        // Seen ids stand in for the pages already consumed.
        let offset = page.saturating_mul(limit).saturating_sub(seen.len());

        let ctx = RecallContext {
            viewer_id: viewer_id.to_string(),
            seed: None,
            followed_owner_ids,
            interest_tags,
            min_candidates: offset.saturating_add(limit).saturating_add(1),
            exclude_ids: seen,
        };
        let outcome = self.discovery_recall.recall_candidates(&ctx).await?;

        let mut scoring = ScoringContext::new(Utc::now());
        scoring.tags = ctx.interest_tags.iter().cloned().collect();
        scoring.interest_ids = outcome.membership.ids(CandidateSource::InterestTags);
        scoring.followed_owner_ids = ctx.followed_owner_ids.iter().cloned().collect();
        scoring.trending_ids = outcome.membership.ids(CandidateSource::Trending);

        let ranked = self.ranking.rank_candidates(outcome.candidates, &scoring);
        let (slice, has_next_page) = paginate_by_offset(&ranked, offset, limit);

        if track_session {
            let served: Vec<String> = slice.iter().map(|c| c.id().to_string()).collect();
            self.session_append(&seen_key, &served, self.config.seen_ttl())
                .await;
        }

        info!(
            viewer_id = %viewer_id,
            page,
            offset,
            seen = ctx.exclude_ids.len(),
            ranked = ranked.len(),
            returned = slice.len(),
            has_next_page,
            "Discovery feed served"
        );

        let items = self
            .annotate(
                viewer_id,
                slice.into_iter().map(|c| (c.item, Some(c.score))).collect(),
            )
            .await;

        Ok(FeedPage {
            items,
            has_next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{item, service};
    use super::*;
    use crate::session::{MemorySessionStore, SessionKeys, SessionStore};
    use crate::store::MemoryStore;
    use chrono::Duration;
    use std::sync::Arc;

    fn populate(store: &MemoryStore, count: usize) {
        for i in 0..count {
            store.insert_item(item(
                &format!("item-{:02}", i),
                &format!("owner-{}", i % 4),
                &["memes"],
                Duration::hours(1 + i as i64),
            ));
        }
    }

    #[tokio::test]
    async fn test_empty_pool_returns_empty_page() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let service = service(&store, &sessions);

        let page = service.get_discovery_feed("viewer", 0, 10).await.unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_an_empty_feed() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        populate(&store, 4);
        store.set_unavailable(true);
        let service = service(&store, &sessions);

        let result = service.get_discovery_feed("viewer", 0, 10).await;
        assert!(matches!(
            result,
            Err(crate::error::FeedError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_pages_skip_seen_items() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        populate(&store, 12);
        store.set_interest("viewer", "memes", 5);
        let service = service(&store, &sessions);

        let first = service.get_discovery_feed("viewer", 0, 5).await.unwrap();
        let second = service.get_discovery_feed("viewer", 1, 5).await.unwrap();
        let third = service.get_discovery_feed("viewer", 2, 5).await.unwrap();

        assert_eq!(first.items.len(), 5);
        assert!(first.has_next_page);
        assert_eq!(second.items.len(), 5);
        assert_eq!(third.items.len(), 2);
        assert!(!third.has_next_page);

        let mut all = HashSet::new();
        for page in [&first, &second, &third] {
            for ranked in &page.items {
                assert!(all.insert(ranked.item.id.clone()), "duplicate {}", ranked.item.id);
            }
        }
        assert_eq!(all.len(), 12);
    }

    #[tokio::test]
    async fn test_page_zero_resets_seen_set() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        populate(&store, 8);
        let service = service(&store, &sessions);

        let first = service.get_discovery_feed("viewer", 0, 4).await.unwrap();
        service.get_discovery_feed("viewer", 1, 4).await.unwrap();
        let restarted = service.get_discovery_feed("viewer", 0, 4).await.unwrap();

        assert_eq!(first.items, restarted.items);
        let seen = sessions
            .get(&SessionKeys::default().explore_seen("viewer"))
            .await
            .unwrap();
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn test_interest_items_rank_first() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        store.insert_items(vec![
            item("plain", "u1", &["news"], Duration::hours(1)),
            item("match", "u2", &["cats"], Duration::hours(3)),
        ]);
        store.set_interest("viewer", "cats", 3);
        let service = service(&store, &sessions);

        let page = service.get_discovery_feed("viewer", 0, 10).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(|i| i.item.id.as_str()).collect();
        assert_eq!(ids, vec!["match", "plain"]);
    }
}
