use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{CandidateSource, ContentItem};
use crate::store::ContentStore;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum TagOrigin {
    Seed,
    Interests,
}

/// Tag-overlap recall, keyed either by the seed's tags or by the viewer's
/// strongest interest tags.
pub struct TagRecallStrategy {
    store: Arc<dyn ContentStore>,
    limit: usize,
    origin: TagOrigin,
}

impl TagRecallStrategy {
    pub fn seed_tags(store: Arc<dyn ContentStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            origin: TagOrigin::Seed,
        }
    }

    pub fn interest_tags(store: Arc<dyn ContentStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            origin: TagOrigin::Interests,
        }
    }

    fn tags<'a>(&self, ctx: &'a RecallContext) -> &'a [String] {
        match self.origin {
            TagOrigin::Seed => ctx.seed.as_ref().map(|s| s.tags.as_slice()).unwrap_or(&[]),
            TagOrigin::Interests => &ctx.interest_tags,
        }
    }
}

#[async_trait]
impl RecallStrategy for TagRecallStrategy {
    async fn recall(&self, ctx: &RecallContext) -> Result<Vec<ContentItem>> {
        let tags = self.tags(ctx);
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .find_by_tags_in(tags, &ctx.seed_exclusion(), self.limit)
            .await
    }

    fn source(&self) -> CandidateSource {
        match self.origin {
            TagOrigin::Seed => CandidateSource::TagOverlap,
            TagOrigin::Interests => CandidateSource::InterestTags,
        }
    }

    fn applies(&self, ctx: &RecallContext) -> bool {
        !self.tags(ctx).is_empty()
    }
}
