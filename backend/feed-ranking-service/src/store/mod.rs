//! Read-side accessors the ranking engine consumes.
//!
//! The engine never writes through these traits; counters, follows and
//! interactions are persisted by the write-side pipeline.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgContentStore;

use crate::error::Result;
use crate::models::{ContentItem, InteractionType, OwnerSort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Logical queries against the content corpus.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_by_id(&self, item_id: &str) -> Result<Option<ContentItem>>;

    /// Items of one owner except `exclude_id`, engagement desc then newest first.
    async fn find_by_owner(
        &self,
        owner_id: &str,
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    async fn find_by_owner_in(
        &self,
        owner_ids: &[String],
        exclude_ids: &[String],
        limit: usize,
        sort: OwnerSort,
    ) -> Result<Vec<ContentItem>>;

    /// Items sharing at least one tag, ordered by (overlap desc, engagement desc).
    async fn find_by_tags_in(
        &self,
        tags: &[String],
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Items created since `since` whose engagement composite exceeds the floor,
    /// ordered by likes then views.
    async fn find_trending(
        &self,
        min_engagement: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Newest items not in `exclude_ids`.
    async fn find_excluding(&self, exclude_ids: &[String], limit: usize)
        -> Result<Vec<ContentItem>>;

    /// Items created strictly after `cutoff`, newest first.
    async fn find_created_after(
        &self,
        cutoff: DateTime<Utc>,
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Items created at or before `cutoff`, newest first.
    async fn find_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>>;
}

/// Social graph and interest profile of a viewer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ViewerProfileStore: Send + Sync {
    async fn find_followed_owner_ids(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>>;

    /// Highest-weighted interest tags, strongest first.
    async fn find_top_interest_tags(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>>;
}

/// Which of a set of items the viewer has interacted with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionIndex: Send + Sync {
    async fn find_interacted_types(
        &self,
        viewer_id: &str,
        item_ids: &[String],
        types: &[InteractionType],
    ) -> Result<HashMap<String, HashSet<InteractionType>>>;
}
