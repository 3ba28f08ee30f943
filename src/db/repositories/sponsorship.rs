//! Sponsored post repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{ContentStatus, ListParams, PagedResult, SponsorshipPost};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait SponsorshipRepository: Send + Sync {
    async fn create(&self, post: &SponsorshipPost) -> Result<SponsorshipPost>;
    async fn get_by_id(&self, id: i64) -> Result<Option<SponsorshipPost>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<SponsorshipPost>>;
    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<SponsorshipPost>>;
    async fn update(&self, post: &SponsorshipPost) -> Result<SponsorshipPost>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxSponsorshipRepository {
    pool: DynDatabasePool,
}

impl SqlxSponsorshipRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SponsorshipRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_FILTER: &str = "WHERE (? IS NULL OR status = ?) \
     AND (? IS NULL OR title LIKE ? ESCAPE '!' OR sponsor_name LIKE ? ESCAPE '!')";

#[async_trait]
impl SponsorshipRepository for SqlxSponsorshipRepository {
    async fn create(&self, post: &SponsorshipPost) -> Result<SponsorshipPost> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO sponsorship_posts (title, slug, sponsor_name, sponsor_url, content, content_html, \
                 image, price_cents, status, published_at, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.sponsor_name)
            .bind(&post.sponsor_url)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.image)
            .bind(post.price_cents)
            .bind(post.status.as_str())
            .bind(post.published_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create sponsorship post")?
            .inserted_id()
        });

        Ok(SponsorshipPost {
            id,
            created_at: now,
            updated_at: now,
            ..post.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SponsorshipPost>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, SponsorshipPost>("SELECT * FROM sponsorship_posts WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get sponsorship post")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<SponsorshipPost>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, SponsorshipPost>("SELECT * FROM sponsorship_posts WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get sponsorship post by slug")
        })
    }

    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<SponsorshipPost>> {
        let order = match status {
            Some(ContentStatus::Published) => "published_at DESC, id DESC",
            _ => "id DESC",
        };
        let status = status.map(|s| s.as_str());
        let pattern = q.map(like_pattern);
        let count_sql = format!("SELECT COUNT(*) FROM sponsorship_posts {}", LIST_FILTER);
        let list_sql = format!(
            "SELECT * FROM sponsorship_posts {} ORDER BY {} LIMIT ? OFFSET ?",
            LIST_FILTER, order
        );

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(pool)
                .await
                .context("Failed to count sponsorship posts")?;
            let items = sqlx::query_as::<_, SponsorshipPost>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list sponsorship posts")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, post: &SponsorshipPost) -> Result<SponsorshipPost> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE sponsorship_posts SET title = ?, slug = ?, sponsor_name = ?, sponsor_url = ?, content = ?, \
                 content_html = ?, image = ?, price_cents = ?, status = ?, published_at = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.sponsor_name)
            .bind(&post.sponsor_url)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.image)
            .bind(post.price_cents)
            .bind(post.status.as_str())
            .bind(post.published_at)
            .bind(now)
            .bind(post.id)
            .execute(pool)
            .await
            .context("Failed to update sponsorship post")?;
        });

        Ok(SponsorshipPost {
            updated_at: now,
            ..post.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "sponsorship_posts", id).await
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "sponsorship_posts", slug, except_id).await
    }
}
