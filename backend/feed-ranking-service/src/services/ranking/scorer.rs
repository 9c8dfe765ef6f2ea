//! Relevance scoring.
//!
//! `score = 1.5·tagOverlap + 2.0·engagement + freshness + affinity`

use crate::models::ContentItem;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub const TAG_OVERLAP_WEIGHT: f64 = 1.5;
pub const ENGAGEMENT_WEIGHT: f64 = 2.0;

/// Hours until the freshness component reaches zero.
pub const FRESHNESS_HORIZON_HOURS: i64 = 100;

pub const INTEREST_BOOST: f64 = 15.0;
pub const FOLLOWING_BOOST: f64 = 10.0;
pub const TRENDING_BOOST: f64 = 5.0;
pub const RECENT_BOOST: f64 = 3.0;
pub const RECENT_WINDOW_MINUTES: i64 = 30;

/// Viewer-side signals for one ranking pass.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    /// Seed tags (related items) or interest tags (discovery).
    pub tags: HashSet<String>,
    /// Ids returned by the interest-tag source.
    pub interest_ids: HashSet<String>,
    pub followed_owner_ids: HashSet<String>,
    pub trending_ids: HashSet<String>,
    pub now: DateTime<Utc>,
}

impl ScoringContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            tags: HashSet::new(),
            interest_ids: HashSet::new(),
            followed_owner_ids: HashSet::new(),
            trending_ids: HashSet::new(),
            now,
        }
    }
}

pub fn tag_overlap(item: &ContentItem, tags: &HashSet<String>) -> usize {
    item.tag_set()
        .into_iter()
        .filter(|tag| tags.contains(*tag))
        .count()
}

/// `max(0, 100 − ageInHours)`; items dated in the future count as brand new.
pub fn freshness(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - created_at).num_hours().max(0);
    (FRESHNESS_HORIZON_HOURS - age_hours).max(0) as f64
}

pub fn affinity_boost(item: &ContentItem, ctx: &ScoringContext) -> f64 {
    let mut boost = 0.0;
    if ctx.interest_ids.contains(&item.id) {
        boost += INTEREST_BOOST;
    }
    if ctx.followed_owner_ids.contains(&item.owner_id) {
        boost += FOLLOWING_BOOST;
    }
    if ctx.trending_ids.contains(&item.id) {
        boost += TRENDING_BOOST;
    }
    if ctx.now - item.created_at <= chrono::Duration::minutes(RECENT_WINDOW_MINUTES) {
        boost += RECENT_BOOST;
    }
    boost
}

pub fn score(item: &ContentItem, ctx: &ScoringContext) -> f64 {
    TAG_OVERLAP_WEIGHT * tag_overlap(item, &ctx.tags) as f64
        + ENGAGEMENT_WEIGHT * item.engagement_composite()
        + freshness(item.created_at, ctx.now)
        + affinity_boost(item, ctx)
}
