mod explore_recall;
mod graph_recall;
mod owner_recall;
mod tag_recall;
mod trending_recall;

use crate::config::RankingConfig;
use crate::error::{FeedError, Result};
use crate::metrics;
use crate::models::{CandidateSource, ContentItem, OwnerSort, RecallStats};
use crate::services::TrendingCache;
use crate::store::ContentStore;
use crate::utils::{with_deadline, BoundedCallError};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub use explore_recall::ExploreRecallStrategy;
pub use graph_recall::FollowingRecallStrategy;
pub use owner_recall::SameOwnerRecallStrategy;
pub use tag_recall::TagRecallStrategy;
pub use trending_recall::TrendingRecallStrategy;

/// Inputs shared by every recall strategy in one pass.
#[derive(Debug, Clone, Default)]
pub struct RecallContext {
    pub viewer_id: String,
    /// Seed item for related-items recall.
    pub seed: Option<ContentItem>,
    pub followed_owner_ids: Vec<String>,
    pub interest_tags: Vec<String>,
    /// Ids that must never become candidates (seed, seen set).
    pub exclude_ids: HashSet<String>,
    /// Below this many candidates the explore source tops the pool up.
    pub min_candidates: usize,
}

impl RecallContext {
    pub fn seed_id(&self) -> Option<&str> {
        self.seed.as_ref().map(|s| s.id.as_str())
    }

    /// Store-level exclusion: only the seed. Seen-set filtering happens during
    /// the merge so the number of already-served candidates can be counted.
    pub fn seed_exclusion(&self) -> Vec<String> {
        self.seed_id().map(|id| vec![id.to_string()]).unwrap_or_default()
    }
}

/// Recall 策略特徵
#[async_trait]
pub trait RecallStrategy: Send + Sync {
    async fn recall(&self, ctx: &RecallContext) -> Result<Vec<ContentItem>>;
    fn source(&self) -> CandidateSource;

    /// False when the context gives this source nothing to query with. A
    /// skipped source issues no store call and counts neither as success nor
    /// as failure.
    fn applies(&self, _ctx: &RecallContext) -> bool {
        true
    }
}

/// Which raw source results contained which ids, before de-duplication.
#[derive(Debug, Clone, Default)]
pub struct SourceMembership {
    by_source: HashMap<CandidateSource, HashSet<String>>,
}

impl SourceMembership {
    fn insert(&mut self, source: CandidateSource, items: &[ContentItem]) {
        self.by_source
            .entry(source)
            .or_default()
            .extend(items.iter().map(|item| item.id.clone()));
    }

    pub fn contains(&self, source: CandidateSource, item_id: &str) -> bool {
        self.by_source
            .get(&source)
            .map(|ids| ids.contains(item_id))
            .unwrap_or(false)
    }

    pub fn ids(&self, source: CandidateSource) -> HashSet<String> {
        self.by_source.get(&source).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecallOutcome {
    pub candidates: Vec<ContentItem>,
    pub stats: RecallStats,
    pub membership: SourceMembership,
}

#[derive(Debug, Clone)]
pub struct RecallPlan {
    pub feed: &'static str,
    pub source_timeout: Duration,
    pub explore_limit: usize,
    pub max_candidates: usize,
}

/// Recall 層：多來源召回候選集
///
/// Primary sources run concurrently under a per-source deadline and are merged
/// in priority order (first occurrence wins). The explore source runs after the
/// join because its exclusion set depends on what the others returned.
pub struct RecallLayer {
    strategies: Vec<Box<dyn RecallStrategy>>,
    explore: ExploreRecallStrategy,
    plan: RecallPlan,
}

impl RecallLayer {
    pub fn new(
        strategies: Vec<Box<dyn RecallStrategy>>,
        explore: ExploreRecallStrategy,
        plan: RecallPlan,
    ) -> Self {
        Self {
            strategies,
            explore,
            plan,
        }
    }

    /// same owner → following → tag overlap → trending → explore
    pub fn related(
        store: Arc<dyn ContentStore>,
        trending: Arc<TrendingCache>,
        config: &RankingConfig,
    ) -> Self {
        let strategies: Vec<Box<dyn RecallStrategy>> = vec![
            Box::new(SameOwnerRecallStrategy::new(
                Arc::clone(&store),
                config.same_owner_limit,
            )),
            Box::new(FollowingRecallStrategy::new(
                Arc::clone(&store),
                config.related_following_limit,
                OwnerSort::Engagement,
            )),
            Box::new(TagRecallStrategy::seed_tags(
                Arc::clone(&store),
                config.tag_overlap_limit,
            )),
            Box::new(TrendingRecallStrategy::new(
                trending,
                config.related_trending_limit,
            )),
        ];

        Self::new(
            strategies,
            ExploreRecallStrategy::new(store),
            RecallPlan {
                feed: "related",
                source_timeout: config.source_timeout(),
                explore_limit: config.explore_limit,
                max_candidates: usize::MAX,
            },
        )
    }

    /// interest tags → following → trending → global fallback
    pub fn discovery(
        store: Arc<dyn ContentStore>,
        trending: Arc<TrendingCache>,
        config: &RankingConfig,
    ) -> Self {
        let strategies: Vec<Box<dyn RecallStrategy>> = vec![
            Box::new(TagRecallStrategy::interest_tags(
                Arc::clone(&store),
                config.interest_recall_limit,
            )),
            Box::new(FollowingRecallStrategy::new(
                Arc::clone(&store),
                config.discovery_following_limit,
                OwnerSort::Recent,
            )),
            Box::new(TrendingRecallStrategy::new(
                trending,
                config.discovery_trending_limit,
            )),
        ];

        Self::new(
            strategies,
            ExploreRecallStrategy::new(store),
            RecallPlan {
                feed: "discovery",
                source_timeout: config.source_timeout(),
                explore_limit: config.discovery_max_candidates,
                max_candidates: config.discovery_max_candidates,
            },
        )
    }

    /// 召回候選集（多來源並行）
    pub async fn recall_candidates(&self, ctx: &RecallContext) -> Result<RecallOutcome> {
        let active: Vec<&dyn RecallStrategy> = self
            .strategies
            .iter()
            .map(|strategy| strategy.as_ref())
            .filter(|strategy| strategy.applies(ctx))
            .collect();
        let results = join_all(
            active
                .iter()
                .map(|strategy| self.run_strategy(*strategy, ctx)),
        )
        .await;
        let mut attempted = active.len();

        let mut stats = RecallStats::default();
        let mut membership = SourceMembership::default();
        let mut added: HashSet<String> = ctx.exclude_ids.clone();
        let mut excluded: HashSet<String> = HashSet::new();
        let mut candidates: Vec<ContentItem> = Vec::new();

        for (strategy, result) in active.iter().zip(results) {
            let source = strategy.source();
            match result {
                Ok(items) => {
                    stats.record(source, items.len());
                    membership.insert(source, &items);
                    for item in items {
                        if ctx.exclude_ids.contains(&item.id) {
                            excluded.insert(item.id.clone());
                            continue;
                        }
                        if added.insert(item.id.clone()) {
                            candidates.push(item);
                        }
                    }
                }
                Err(_) => stats.failed_sources.push(source),
            }
        }

        stats.excluded_count = excluded.len();

        let target = ctx.min_candidates.min(self.plan.max_candidates);
        if candidates.len() < target {
            let room = self
                .plan
                .max_candidates
                .saturating_sub(candidates.len())
                .min(self.plan.explore_limit);
            if room > 0 {
                self.top_up(&mut candidates, &mut added, &mut stats, room)
                    .await;
                attempted += 1;
            }
        }

        // Every store call that was issued failed: the store is down, not empty.
        if attempted > 0 && stats.failed_sources.len() == attempted {
            error!(
                feed = self.plan.feed,
                viewer_id = %ctx.viewer_id,
                attempted,
                "Every candidate source failed"
            );
            return Err(FeedError::StoreUnavailable(format!(
                "all {} candidate sources failed",
                attempted
            )));
        }

        stats.total_candidates = candidates.len();
        metrics::record_candidates(self.plan.feed, candidates.len());

        info!(
            feed = self.plan.feed,
            viewer_id = %ctx.viewer_id,
            same_owner = stats.same_owner_count,
            following = stats.following_count,
            tag_overlap = stats.tag_overlap_count,
            interest = stats.interest_count,
            trending = stats.trending_count,
            explore = stats.explore_count,
            excluded = stats.excluded_count,
            total = stats.total_candidates,
            "Recall completed"
        );

        Ok(RecallOutcome {
            candidates,
            stats,
            membership,
        })
    }

    async fn run_strategy(
        &self,
        strategy: &dyn RecallStrategy,
        ctx: &RecallContext,
    ) -> std::result::Result<Vec<ContentItem>, BoundedCallError> {
        let source = strategy.source();
        match with_deadline(self.plan.source_timeout, strategy.recall(ctx)).await {
            Ok(items) => {
                metrics::record_source_outcome(source.as_str(), "ok");
                Ok(items)
            }
            Err(e) => {
                warn!(
                    feed = self.plan.feed,
                    source = %source,
                    error = %e,
                    "Candidate source degraded to empty"
                );
                metrics::record_source_outcome(source.as_str(), e.outcome_label());
                Err(e)
            }
        }
    }

    async fn top_up(
        &self,
        candidates: &mut Vec<ContentItem>,
        added: &mut HashSet<String>,
        stats: &mut RecallStats,
        room: usize,
    ) {
        let mut exclude: Vec<String> = added.iter().cloned().collect();
        exclude.sort();

        match with_deadline(self.plan.source_timeout, self.explore.top_up(&exclude, room)).await {
            Ok(items) => {
                metrics::record_source_outcome(CandidateSource::Explore.as_str(), "ok");
                stats.record(CandidateSource::Explore, items.len());
                for item in items {
                    if candidates.len() >= self.plan.max_candidates {
                        break;
                    }
                    if added.insert(item.id.clone()) {
                        candidates.push(item);
                    }
                }
            }
            Err(e) => {
                warn!(feed = self.plan.feed, error = %e, "Explore top-up failed");
                metrics::record_source_outcome(
                    CandidateSource::Explore.as_str(),
                    e.outcome_label(),
                );
                stats.failed_sources.push(CandidateSource::Explore);
            }
        }
    }
}
