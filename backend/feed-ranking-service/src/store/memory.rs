use super::{ContentStore, InteractionIndex, ViewerProfileStore};
use crate::error::{FeedError, Result};
use crate::models::{ContentItem, InteractionType, OwnerSort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

/// In-process corpus used by tests and `STORE_BACKEND=memory` runs.
///
/// Implements the same orderings the Postgres queries use so rankings are
/// comparable between the two backends.
#[derive(Default)]
pub struct MemoryStore {
    items: DashMap<String, ContentItem>,
    follows: DashMap<String, Vec<String>>,
    interests: DashMap<String, HashMap<String, i64>>,
    interactions: DashMap<String, HashMap<String, HashSet<InteractionType>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, item: ContentItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn insert_items<I: IntoIterator<Item = ContentItem>>(&self, items: I) {
        for item in items {
            self.insert_item(item);
        }
    }

    pub fn follow(&self, follower_id: &str, followed_id: &str) {
        let mut entry = self.follows.entry(follower_id.to_string()).or_default();
        if !entry.iter().any(|id| id == followed_id) {
            entry.push(followed_id.to_string());
        }
    }

    pub fn set_interest(&self, viewer_id: &str, tag: &str, weight: i64) {
        self.interests
            .entry(viewer_id.to_string())
            .or_default()
            .insert(tag.to_string(), weight);
    }

    pub fn record_interaction(&self, viewer_id: &str, item_id: &str, kind: InteractionType) {
        self.interactions
            .entry(viewer_id.to_string())
            .or_default()
            .entry(item_id.to_string())
            .or_default()
            .insert(kind);
    }

    /// Simulate the backing database going away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(FeedError::Database("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn select<F>(&self, mut predicate: F) -> Vec<ContentItem>
    where
        F: FnMut(&ContentItem) -> bool,
    {
        self.items
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

fn by_engagement_then_recent(a: &ContentItem, b: &ContentItem) -> Ordering {
    b.engagement_composite()
        .total_cmp(&a.engagement_composite())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

fn by_recent(a: &ContentItem, b: &ContentItem) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn by_counters(a: &ContentItem, b: &ContentItem) -> Ordering {
    (b.likes, b.saves, b.comments, b.views)
        .cmp(&(a.likes, a.saves, a.comments, a.views))
        .then_with(|| b.id.cmp(&a.id))
}

fn overlap(tags: &HashSet<&str>, item: &ContentItem) -> usize {
    item.tag_set().intersection(tags).count()
}

fn take(
    mut items: Vec<ContentItem>,
    order: fn(&ContentItem, &ContentItem) -> Ordering,
    limit: usize,
) -> Vec<ContentItem> {
    items.sort_by(order);
    items.truncate(limit);
    items
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_by_id(&self, item_id: &str) -> Result<Option<ContentItem>> {
        self.ensure_available()?;
        Ok(self.items.get(item_id).map(|entry| entry.value().clone()))
    }

    async fn find_by_owner(
        &self,
        owner_id: &str,
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let items = self.select(|item| item.owner_id == owner_id && item.id != exclude_id);
        Ok(take(items, by_engagement_then_recent, limit))
    }

    async fn find_by_owner_in(
        &self,
        owner_ids: &[String],
        exclude_ids: &[String],
        limit: usize,
        sort: OwnerSort,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let owners: HashSet<&str> = owner_ids.iter().map(String::as_str).collect();
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let items = self.select(|item| {
            owners.contains(item.owner_id.as_str()) && !excluded.contains(item.id.as_str())
        });
        let order: fn(&ContentItem, &ContentItem) -> Ordering = match sort {
            OwnerSort::Engagement => by_counters,
            OwnerSort::Recent => by_recent,
        };
        Ok(take(items, order, limit))
    }

    async fn find_by_tags_in(
        &self,
        tags: &[String],
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let wanted: HashSet<&str> = tags.iter().map(String::as_str).collect();
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let mut items = self.select(|item| {
            !excluded.contains(item.id.as_str()) && overlap(&wanted, item) > 0
        });
        items.sort_by(|a, b| {
            overlap(&wanted, b)
                .cmp(&overlap(&wanted, a))
                .then_with(|| by_engagement_then_recent(a, b))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn find_trending(
        &self,
        min_engagement: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let mut items = self.select(|item| {
            item.created_at >= since && item.engagement_composite() > min_engagement
        });
        items.sort_by(|a, b| {
            (b.likes, b.views)
                .cmp(&(a.likes, a.views))
                .then_with(|| b.id.cmp(&a.id))
        });
        items.truncate(limit);
        Ok(items)
    }

    async fn find_excluding(
        &self,
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let items = self.select(|item| !excluded.contains(item.id.as_str()));
        Ok(take(items, by_recent, limit))
    }

    async fn find_created_after(
        &self,
        cutoff: DateTime<Utc>,
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let items =
            self.select(|item| item.created_at > cutoff && !excluded.contains(item.id.as_str()));
        Ok(take(items, by_recent, limit))
    }

    async fn find_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        self.ensure_available()?;
        let items = self.select(|item| item.created_at <= cutoff);
        Ok(take(items, by_recent, limit))
    }
}

#[async_trait]
impl ViewerProfileStore for MemoryStore {
    async fn find_followed_owner_ids(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>> {
        self.ensure_available()?;
        Ok(self
            .follows
            .get(viewer_id)
            .map(|entry| entry.value().iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_top_interest_tags(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>> {
        self.ensure_available()?;
        let Some(weights) = self.interests.get(viewer_id) else {
            return Ok(Vec::new());
        };
        let mut ranked: Vec<(&String, &i64)> =
            weights.value().iter().filter(|(_, w)| **w > 0).collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(tag, _)| tag.clone())
            .collect())
    }
}

#[async_trait]
impl InteractionIndex for MemoryStore {
    async fn find_interacted_types(
        &self,
        viewer_id: &str,
        item_ids: &[String],
        types: &[InteractionType],
    ) -> Result<HashMap<String, HashSet<InteractionType>>> {
        self.ensure_available()?;
        let Some(by_item) = self.interactions.get(viewer_id) else {
            return Ok(HashMap::new());
        };
        let wanted: HashSet<InteractionType> = types.iter().copied().collect();
        let mut result = HashMap::new();
        for id in item_ids {
            if let Some(kinds) = by_item.value().get(id) {
                let matched: HashSet<InteractionType> =
                    kinds.intersection(&wanted).copied().collect();
                if !matched.is_empty() {
                    result.insert(id.clone(), matched);
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(id: &str, owner: &str, tags: &[&str], likes: i64, age_hours: i64) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            owner_id: owner.to_string(),
            created_at: Utc::now() - Duration::hours(age_hours),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            likes,
            saves: 0,
            comments: 0,
            views: 0,
        }
    }

    #[tokio::test]
    async fn test_tags_ordered_by_overlap_then_engagement() {
        let store = MemoryStore::new();
        store.insert_items(vec![
            item("a", "u1", &["funny"], 100, 1),
            item("b", "u2", &["funny", "cats"], 1, 1),
            item("c", "u3", &["dogs"], 500, 1),
            item("d", "u4", &["cats"], 50, 1),
        ]);

        let tags = vec!["funny".to_string(), "cats".to_string()];
        let found = store.find_by_tags_in(&tags, &[], 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "d"]);
    }

    #[tokio::test]
    async fn test_trending_respects_floor_and_window() {
        let store = MemoryStore::new();
        store.insert_items(vec![
            item("hot", "u1", &[], 50, 2),
            item("old-hot", "u1", &[], 90, 24 * 30),
            item("cold", "u2", &[], 1, 2),
        ]);

        let since = Utc::now() - Duration::hours(168);
        let found = store.find_trending(20.0, since, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "hot");
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.find_by_id("x").await.is_err());
        store.set_unavailable(false);
        assert!(store.find_by_id("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interest_tags_strongest_first() {
        let store = MemoryStore::new();
        store.set_interest("v", "cats", 3);
        store.set_interest("v", "funny", 9);
        store.set_interest("v", "decayed", 0);
        let tags = store.find_top_interest_tags("v", 5).await.unwrap();
        assert_eq!(tags, vec!["funny".to_string(), "cats".to_string()]);
    }

    #[tokio::test]
    async fn test_interactions_filtered_by_type() {
        let store = MemoryStore::new();
        store.record_interaction("v", "m1", InteractionType::Like);
        store.record_interaction("v", "m2", InteractionType::Save);
        let ids = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let found = store
            .find_interacted_types("v", &ids, &[InteractionType::Like])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found["m1"].contains(&InteractionType::Like));
    }
}
