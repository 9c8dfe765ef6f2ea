use super::{observe, FeedService};
use crate::error::Result;
use crate::models::{CandidateSource, RelatedItemsPage};
use crate::services::pagination::{paginate_by_cursor, Cursor};
use crate::services::ranking::ScoringContext;
use crate::services::recall::RecallContext;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

impl FeedService {
    /// Items related to `item_id`, ranked for `viewer_id` and paged by cursor.
    ///
    /// An unknown seed yields an empty page. Fails only when the content store
    /// is unavailable.
    pub async fn get_related_items(
        &self,
        item_id: &str,
        viewer_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<RelatedItemsPage> {
        let started = Instant::now();
        let result = self.related_items(item_id, viewer_id, cursor, limit).await;
        observe("related", started, &result);
        result
    }

    async fn related_items(
        &self,
        item_id: &str,
        viewer_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<RelatedItemsPage> {
        let Some(seed) = self.primary(self.deps.content.find_by_id(item_id)).await? else {
            debug!(item_id = %item_id, "Seed item not found");
            return Ok(RelatedItemsPage::default());
        };

        let followed_owner_ids = self.followed_owner_ids(viewer_id).await;

        let ctx = RecallContext {
            viewer_id: viewer_id.to_string(),
            exclude_ids: HashSet::from([seed.id.clone()]),
            seed: Some(seed),
            followed_owner_ids,
            interest_tags: Vec::new(),
            min_candidates: self.config.related_top_up_threshold,
        };
        let outcome = self.related_recall.recall_candidates(&ctx).await?;

        // Later pages score at the time the first page was scored.
        let now = cursor.as_of.unwrap_or_else(Utc::now);
        let mut scoring = ScoringContext::new(now);
        scoring.tags = ctx
            .seed
            .as_ref()
            .map(|s| s.tags.iter().cloned().collect())
            .unwrap_or_default();
        scoring.followed_owner_ids = ctx.followed_owner_ids.iter().cloned().collect();
        scoring.trending_ids = outcome.membership.ids(CandidateSource::Trending);

        let ranked = self.ranking.rank_candidates(outcome.candidates, &scoring);
        let diversified = self.diversity.diversify(ranked);
        let page = paginate_by_cursor(&diversified, cursor, limit);

        info!(
            item_id = %item_id,
            viewer_id = %viewer_id,
            diversified = diversified.len(),
            returned = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Related items served"
        );

        let items = self
            .annotate(
                viewer_id,
                page.items
                    .into_iter()
                    .map(|c| (c.item, Some(c.score)))
                    .collect(),
            )
            .await;

        Ok(RelatedItemsPage {
            items,
            next_cursor: page.next_cursor.map(|next| next.anchored_at(now)),
        })
    }
}
