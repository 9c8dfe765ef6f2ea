use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{CandidateSource, ContentItem};
use crate::services::TrendingCache;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Trending Recall Strategy - 熱門召回
/// Reads the shared trending snapshot instead of hitting the store per request.
pub struct TrendingRecallStrategy {
    cache: Arc<TrendingCache>,
    limit: usize,
}

impl TrendingRecallStrategy {
    pub fn new(cache: Arc<TrendingCache>, limit: usize) -> Self {
        Self { cache, limit }
    }
}

#[async_trait]
impl RecallStrategy for TrendingRecallStrategy {
    async fn recall(&self, ctx: &RecallContext) -> Result<Vec<ContentItem>> {
        let trending = self.cache.get().await?;
        if trending.is_empty() {
            debug!("No trending items in window");
            return Ok(Vec::new());
        }

        let seed_id = ctx.seed_id();
        Ok(trending
            .iter()
            .filter(|item| Some(item.id.as_str()) != seed_id)
            .take(self.limit)
            .cloned()
            .collect())
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Trending
    }
}
