//! Service listing repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{ActiveStatus, ListParams, PagedResult, ServiceListing};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait ServiceListingRepository: Send + Sync {
    async fn create(&self, listing: &ServiceListing) -> Result<ServiceListing>;
    async fn get_by_id(&self, id: i64) -> Result<Option<ServiceListing>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<ServiceListing>>;
    async fn list(
        &self,
        status: Option<ActiveStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<ServiceListing>>;
    async fn update(&self, listing: &ServiceListing) -> Result<ServiceListing>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxServiceListingRepository {
    pool: DynDatabasePool,
}

impl SqlxServiceListingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ServiceListingRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_FILTER: &str = "WHERE (? IS NULL OR status = ?) \
     AND (? IS NULL OR name LIKE ? ESCAPE '!' OR description LIKE ? ESCAPE '!')";

#[async_trait]
impl ServiceListingRepository for SqlxServiceListingRepository {
    async fn create(&self, listing: &ServiceListing) -> Result<ServiceListing> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO service_listings (provider_id, name, slug, description, price_cents, delivery_days, \
                 image, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(listing.provider_id)
            .bind(&listing.name)
            .bind(&listing.slug)
            .bind(&listing.description)
            .bind(listing.price_cents)
            .bind(listing.delivery_days)
            .bind(&listing.image)
            .bind(listing.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create service listing")?
            .inserted_id()
        });

        Ok(ServiceListing {
            id,
            created_at: now,
            updated_at: now,
            ..listing.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ServiceListing>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, ServiceListing>("SELECT * FROM service_listings WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get service listing")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ServiceListing>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, ServiceListing>("SELECT * FROM service_listings WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get service listing by slug")
        })
    }

    async fn list(
        &self,
        status: Option<ActiveStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<ServiceListing>> {
        let status = status.map(|s| s.as_str());
        let pattern = q.map(like_pattern);
        let count_sql = format!("SELECT COUNT(*) FROM service_listings {}", LIST_FILTER);
        let list_sql = format!(
            "SELECT * FROM service_listings {} ORDER BY id DESC LIMIT ? OFFSET ?",
            LIST_FILTER
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
                .context("Failed to count service listings")?;
            let items = sqlx::query_as::<_, ServiceListing>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list service listings")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, listing: &ServiceListing) -> Result<ServiceListing> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE service_listings SET provider_id = ?, name = ?, slug = ?, description = ?, price_cents = ?, \
                 delivery_days = ?, image = ?, status = ?, updated_at = ? WHERE id = ?",
            )
            .bind(listing.provider_id)
            .bind(&listing.name)
            .bind(&listing.slug)
            .bind(&listing.description)
            .bind(listing.price_cents)
            .bind(listing.delivery_days)
            .bind(&listing.image)
            .bind(listing.status.as_str())
            .bind(now)
            .bind(listing.id)
            .execute(pool)
            .await
            .context("Failed to update service listing")?;
        });

        Ok(ServiceListing {
            updated_at: now,
            ..listing.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "service_listings", id).await
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "service_listings", slug, except_id).await
    }
}
