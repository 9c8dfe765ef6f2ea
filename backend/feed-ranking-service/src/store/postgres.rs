use super::{ContentStore, InteractionIndex, ViewerProfileStore};
use crate::config::DatabaseConfig;
use crate::error::{FeedError, Result};
use crate::models::{ContentItem, InteractionType, OwnerSort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{error, info, warn};

/// Postgres-backed accessor for content, follows, interests and interactions.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a verified connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!(error = %e, "Database pool creation failed");
                FeedError::StoreUnavailable(e.to_string())
            })?;

        sqlx::query("SELECT 1").execute(&pool).await.map_err(|e| {
            error!(error = %e, "Database connection verification failed");
            FeedError::StoreUnavailable(e.to_string())
        })?;

        info!(max_connections = config.max_connections, "Database pool created and verified");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| FeedError::Database(format!("migration failed: {}", e)))?;
        info!("Database migrations completed successfully");
        Ok(())
    }
}

fn db_error(query: &str, err: sqlx::Error) -> FeedError {
    error!(query = query, error = %err, "Content store query failed");
    FeedError::Database(err.to_string())
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn find_by_id(&self, item_id: &str) -> Result<Option<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find_by_id", e))
    }

    async fn find_by_owner(
        &self,
        owner_id: &str,
        exclude_id: &str,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE owner_id = $1 AND id <> $2 AND NOT is_deleted
            ORDER BY (like_count * 2 + comment_count * 1.5 + save_count + view_count * 0.5) DESC,
                     created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(exclude_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_by_owner", e))
    }

    async fn find_by_owner_in(
        &self,
        owner_ids: &[String],
        exclude_ids: &[String],
        limit: usize,
        sort: OwnerSort,
    ) -> Result<Vec<ContentItem>> {
        if owner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = match sort {
            OwnerSort::Engagement => {
                r#"
                SELECT id, owner_id, created_at, tags,
                       like_count AS likes, save_count AS saves,
                       comment_count AS comments, view_count AS views
                FROM content_items
                WHERE owner_id = ANY($1) AND NOT (id = ANY($2)) AND NOT is_deleted
                ORDER BY like_count DESC, save_count DESC, comment_count DESC,
                         view_count DESC, id DESC
                LIMIT $3
                "#
            }
            OwnerSort::Recent => {
                r#"
                SELECT id, owner_id, created_at, tags,
                       like_count AS likes, save_count AS saves,
                       comment_count AS comments, view_count AS views
                FROM content_items
                WHERE owner_id = ANY($1) AND NOT (id = ANY($2)) AND NOT is_deleted
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#
            }
        };

        sqlx::query_as::<_, ContentItem>(sql)
            .bind(owner_ids)
            .bind(exclude_ids)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("find_by_owner_in", e))
    }

    async fn find_by_tags_in(
        &self,
        tags: &[String],
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE tags && $1::TEXT[] AND NOT (id = ANY($2)) AND NOT is_deleted
            ORDER BY cardinality(ARRAY(
                         SELECT unnest(tags) INTERSECT SELECT unnest($1::TEXT[])
                     )) DESC,
                     (like_count * 2 + comment_count * 1.5 + save_count + view_count * 0.5) DESC,
                     created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(tags)
        .bind(exclude_ids)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_by_tags_in", e))
    }

    async fn find_trending(
        &self,
        min_engagement: f64,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE created_at >= $2
              AND (like_count * 2 + comment_count * 1.5 + save_count + view_count * 0.5) > $1::FLOAT8
              AND NOT is_deleted
            ORDER BY like_count DESC, view_count DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(min_engagement)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_trending", e))
    }

    async fn find_excluding(
        &self,
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE NOT (id = ANY($1)) AND NOT is_deleted
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(exclude_ids)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_excluding", e))
    }

    async fn find_created_after(
        &self,
        cutoff: DateTime<Utc>,
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE created_at > $1 AND NOT (id = ANY($2)) AND NOT is_deleted
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(cutoff)
        .bind(exclude_ids)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_created_after", e))
    }

    async fn find_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            SELECT id, owner_id, created_at, tags,
                   like_count AS likes, save_count AS saves,
                   comment_count AS comments, view_count AS views
            FROM content_items
            WHERE created_at <= $1 AND NOT is_deleted
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_created_before", e))
    }
}

#[async_trait]
impl ViewerProfileStore for PgContentStore {
    async fn find_followed_owner_ids(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT followed_id
            FROM follows
            WHERE follower_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_followed_owner_ids", e))
    }

    async fn find_top_interest_tags(&self, viewer_id: &str, limit: usize) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT tag
            FROM viewer_tag_interests
            WHERE viewer_id = $1 AND weight > 0
            ORDER BY weight DESC, tag ASC
            LIMIT $2
            "#,
        )
        .bind(viewer_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_top_interest_tags", e))
    }
}

#[async_trait]
impl InteractionIndex for PgContentStore {
    async fn find_interacted_types(
        &self,
        viewer_id: &str,
        item_ids: &[String],
        types: &[InteractionType],
    ) -> Result<HashMap<String, HashSet<InteractionType>>> {
        if item_ids.is_empty() || types.is_empty() {
            return Ok(HashMap::new());
        }

        let type_names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT item_id, interaction_type
            FROM interactions
            WHERE viewer_id = $1 AND item_id = ANY($2) AND interaction_type = ANY($3)
            "#,
        )
        .bind(viewer_id)
        .bind(item_ids)
        .bind(&type_names)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find_interacted_types", e))?;

        let mut result: HashMap<String, HashSet<InteractionType>> = HashMap::new();
        for (item_id, kind) in rows {
            match kind.parse::<InteractionType>() {
                Ok(kind) => {
                    result.entry(item_id).or_default().insert(kind);
                }
                Err(e) => warn!(item_id = %item_id, error = %e, "Skipping unknown interaction row"),
            }
        }
        Ok(result)
    }
}
