use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{CandidateSource, ContentItem};
use crate::store::ContentStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Other items by the seed's owner, most engaged first.
pub struct SameOwnerRecallStrategy {
    store: Arc<dyn ContentStore>,
    limit: usize,
}

impl SameOwnerRecallStrategy {
    pub fn new(store: Arc<dyn ContentStore>, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl RecallStrategy for SameOwnerRecallStrategy {
    async fn recall(&self, ctx: &RecallContext) -> Result<Vec<ContentItem>> {
        let Some(seed) = ctx.seed.as_ref() else {
            return Ok(Vec::new());
        };

        self.store
            .find_by_owner(&seed.owner_id, &seed.id, self.limit)
            .await
    }

    fn source(&self) -> CandidateSource {
        CandidateSource::SameOwner
    }

    fn applies(&self, ctx: &RecallContext) -> bool {
        ctx.seed.is_some()
    }
}
