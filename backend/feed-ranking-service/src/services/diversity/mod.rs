use crate::models::ScoredCandidate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Diversity Layer - 多樣性過濾
///
/// Greedy pass over a score-descending list: an item is kept only while its
/// owner has fewer than `max_per_owner` kept items and none of its tags were
/// used by an earlier kept item. The tag rule can starve tag-clustered corpora,
/// so when fewer than `min_fill` items survive, dropped items are re-admitted
/// in score order with only the owner cap enforced.
pub struct DiversityLayer {
    max_per_owner: usize,
    max_items: usize,
    min_fill: usize,
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::new(2, 100, 20)
    }
}

impl DiversityLayer {
    pub fn new(max_per_owner: usize, max_items: usize, min_fill: usize) -> Self {
        Self {
            max_per_owner,
            max_items,
            min_fill: min_fill.min(max_items),
        }
    }

    /// Filters `ranked` and returns the survivors in their original order.
    pub fn diversify(&self, ranked: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let kept = self.keep_mask(&ranked);
        ranked
            .into_iter()
            .zip(kept)
            .filter_map(|(candidate, keep)| keep.then_some(candidate))
            .collect()
    }

    fn keep_mask(&self, ranked: &[ScoredCandidate]) -> Vec<bool> {
        let total = ranked.len();
        let mut owner_counts: HashMap<&str, usize> = HashMap::new();
        let mut used_tags: HashSet<&str> = HashSet::new();
        let mut kept = vec![false; total];
        let mut kept_count = 0;

        for (idx, candidate) in ranked.iter().enumerate() {
            if kept_count >= self.max_items {
                break;
            }
            let owner = candidate.item.owner_id.as_str();
            if owner_counts.get(owner).copied().unwrap_or(0) >= self.max_per_owner {
                continue;
            }
            if candidate
                .item
                .tags
                .iter()
                .any(|tag| used_tags.contains(tag.as_str()))
            {
                continue;
            }

            *owner_counts.entry(owner).or_insert(0) += 1;
            used_tags.extend(candidate.item.tags.iter().map(String::as_str));
            kept[idx] = true;
            kept_count += 1;
        }

        let strict_count = kept_count;
        if kept_count < self.min_fill {
            for (idx, candidate) in ranked.iter().enumerate() {
                if kept_count >= self.min_fill {
                    break;
                }
                if kept[idx] {
                    continue;
                }
                let owner = candidate.item.owner_id.as_str();
                let count = owner_counts.entry(owner).or_insert(0);
                if *count >= self.max_per_owner {
                    continue;
                }
                *count += 1;
                kept[idx] = true;
                kept_count += 1;
            }
        }

        debug!(
            input = total,
            strict = strict_count,
            backfilled = kept_count - strict_count,
            "Diversity pass completed"
        );

        kept
    }
}
