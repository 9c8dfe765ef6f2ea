use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A piece of content as stored in the corpus.
///
/// The ranking engine only reads these; counters are eventually consistent
/// and may lag the write-side pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub likes: i64,
    pub saves: i64,
    pub comments: i64,
    pub views: i64,
}

impl ContentItem {
    /// Weighted engagement: 2·likes + 1.5·comments + 1·saves + 0.5·views
    pub fn engagement_composite(&self) -> f64 {
        self.likes as f64 * 2.0
            + self.comments as f64 * 1.5
            + self.saves as f64
            + self.views as f64 * 0.5
    }

    pub fn tag_set(&self) -> HashSet<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

/// Where a candidate came from during recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    SameOwner,    // 同一作者
    Following,    // 關注作者
    TagOverlap,   // 標籤相似
    InterestTags, // 興趣標籤
    Trending,     // 熱門
    Explore,      // 補位
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::SameOwner => "same_owner",
            CandidateSource::Following => "following",
            CandidateSource::TagOverlap => "tag_overlap",
            CandidateSource::InterestTags => "interest_tags",
            CandidateSource::Trending => "trending",
            CandidateSource::Explore => "explore",
        }
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for owner-set queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerSort {
    /// likes, saves, comments, views (all descending)
    Engagement,
    /// created_at descending
    Recent,
}

/// A candidate paired with its pass-local score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: ContentItem,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(item: ContentItem, score: f64) -> Self {
        Self { item, score }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// Viewer interaction kinds recorded by the interaction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Like,
    Save,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Like => "like",
            InteractionType::Save => "save",
        }
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "like" => Ok(InteractionType::Like),
            "save" => Ok(InteractionType::Save),
            other => Err(format!("unknown interaction type: {}", other)),
        }
    }
}

/// An item as returned to the caller, annotated for the requesting viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub liked: bool,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Related-items page: cursor paginated.
#[derive(Debug, Clone, Default)]
pub struct RelatedItemsPage {
    pub items: Vec<RankedItem>,
    pub next_cursor: Option<crate::services::Cursor>,
}

/// Discovery / main-feed page: page-index paginated.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<RankedItem>,
    pub has_next_page: bool,
}

/// Per-pass recall bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct RecallStats {
    pub same_owner_count: usize,
    pub following_count: usize,
    pub tag_overlap_count: usize,
    pub interest_count: usize,
    pub trending_count: usize,
    pub explore_count: usize,
    /// Distinct ids dropped because they were already excluded (seed, seen set).
    pub excluded_count: usize,
    pub failed_sources: Vec<CandidateSource>,
    pub total_candidates: usize,
}

impl RecallStats {
    pub fn record(&mut self, source: CandidateSource, count: usize) {
        match source {
            CandidateSource::SameOwner => self.same_owner_count = count,
            CandidateSource::Following => self.following_count = count,
            CandidateSource::TagOverlap => self.tag_overlap_count = count,
            CandidateSource::InterestTags => self.interest_count = count,
            CandidateSource::Trending => self.trending_count = count,
            CandidateSource::Explore => self.explore_count = count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(likes: i64, comments: i64, saves: i64, views: i64) -> ContentItem {
        ContentItem {
            id: "m1".to_string(),
            owner_id: "u1".to_string(),
            created_at: Utc::now(),
            tags: vec!["funny".to_string()],
            likes,
            saves,
            comments,
            views,
        }
    }

    #[test]
    fn test_engagement_composite_weights() {
        assert_eq!(item(1, 0, 0, 0).engagement_composite(), 2.0);
        assert_eq!(item(0, 1, 0, 0).engagement_composite(), 1.5);
        assert_eq!(item(0, 0, 1, 0).engagement_composite(), 1.0);
        assert_eq!(item(0, 0, 0, 1).engagement_composite(), 0.5);
        assert_eq!(item(10, 4, 3, 20).engagement_composite(), 20.0 + 6.0 + 3.0 + 10.0);
    }

    #[test]
    fn test_interaction_type_parse() {
        assert_eq!("LIKE".parse::<InteractionType>(), Ok(InteractionType::Like));
        assert_eq!("save".parse::<InteractionType>(), Ok(InteractionType::Save));
        assert!("share".parse::<InteractionType>().is_err());
    }

    #[test]
    fn test_ranked_item_serializes_flat() {
        let ranked = RankedItem {
            item: item(1, 0, 0, 0),
            liked: true,
            saved: false,
            score: None,
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["id"], "m1");
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["liked"], true);
        assert!(json.get("score").is_none());
    }
}
