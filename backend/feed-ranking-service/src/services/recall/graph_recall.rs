use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{CandidateSource, ContentItem, OwnerSort};
use crate::store::ContentStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Graph Recall Strategy - 基於關注的召回
pub struct FollowingRecallStrategy {
    store: Arc<dyn ContentStore>,
    limit: usize,
    sort: OwnerSort,
}

impl FollowingRecallStrategy {
    pub fn new(store: Arc<dyn ContentStore>, limit: usize, sort: OwnerSort) -> Self {
        Self { store, limit, sort }
    }
}

#[async_trait]
impl RecallStrategy for FollowingRecallStrategy {
    async fn recall(&self, ctx: &RecallContext) -> Result<Vec<ContentItem>> {
        if ctx.followed_owner_ids.is_empty() {
            debug!(viewer_id = %ctx.viewer_id, "Viewer follows nobody, graph recall returns empty");
            return Ok(Vec::new());
        }

        self.store
            .find_by_owner_in(
                &ctx.followed_owner_ids,
                &ctx.seed_exclusion(),
                self.limit,
                self.sort,
            )
            .await
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::Following
    }

    fn applies(&self, ctx: &RecallContext) -> bool {
        !ctx.followed_owner_ids.is_empty()
    }
}
