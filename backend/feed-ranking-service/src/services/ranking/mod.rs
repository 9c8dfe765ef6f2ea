//! Ranking Layer
//!
//! Scores candidates with a weighted linear formula and orders them
//! score-descending with id-descending as the tie-break. That total order is
//! what cursor pagination relies on.

pub mod scorer;

pub use scorer::ScoringContext;

use crate::models::{ContentItem, ScoredCandidate};
use std::cmp::Ordering;

/// Total order used by every ranked list: score desc, then id desc.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.item.id.cmp(&a.item.id))
}

#[derive(Debug, Default)]
pub struct RankingLayer;

impl RankingLayer {
    pub fn new() -> Self {
        Self
    }

    /// 對候選集進行打分排序
    pub fn rank_candidates(
        &self,
        candidates: Vec<ContentItem>,
        ctx: &ScoringContext,
    ) -> Vec<ScoredCandidate> {
        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|item| {
                let score = scorer::score(&item, ctx);
                ScoredCandidate::new(item, score)
            })
            .collect();

        ranked.sort_by(rank_order);
        ranked
    }
}
