use crate::error::Result;
use crate::models::ContentItem;
use crate::store::ContentStore;
use std::sync::Arc;

/// Global fallback: any live item not already collected.
pub struct ExploreRecallStrategy {
    store: Arc<dyn ContentStore>,
}

impl ExploreRecallStrategy {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn top_up(&self, exclude_ids: &[String], limit: usize) -> Result<Vec<ContentItem>> {
        self.store.find_excluding(exclude_ids, limit).await
    }
}
