//! Product repository

use crate::db::repositories::{delete_by_id, has_payments, slug_taken};
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{ContentStatus, ListParams, PagedResult, Product};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: &Product) -> Result<Product>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    /// Filter by status and a name/description search, newest first
    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Product>>;
    async fn update(&self, product: &Product) -> Result<Product>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;
    /// Whether any payment was submitted for the product
    async fn has_payments(&self, id: i64) -> Result<bool>;
}

pub struct SqlxProductRepository {
    pool: DynDatabasePool,
}

impl SqlxProductRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_FILTER: &str = "WHERE (? IS NULL OR status = ?) \
     AND (? IS NULL OR name LIKE ? ESCAPE '!' OR description LIKE ? ESCAPE '!')";

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn create(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO products (vendor_id, name, slug, description, price_cents, cover_image, \
                 file_path, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(product.vendor_id)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(&product.cover_image)
            .bind(&product.file_path)
            .bind(product.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create product")?
            .inserted_id()
        });

        Ok(Product {
            id,
            created_at: now,
            updated_at: now,
            ..product.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get product")
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = ?")
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get product by slug")
        })
    }

    async fn list(
        &self,
        status: Option<ContentStatus>,
        q: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Product>> {
        let status = status.map(|s| s.as_str());
        let pattern = q.map(like_pattern);
        let count_sql = format!("SELECT COUNT(*) FROM products {}", LIST_FILTER);
        let list_sql = format!(
            "SELECT * FROM products {} ORDER BY id DESC LIMIT ? OFFSET ?",
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
                .context("Failed to count products")?;
            let items = sqlx::query_as::<_, Product>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list products")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, product: &Product) -> Result<Product> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE products SET vendor_id = ?, name = ?, slug = ?, description = ?, price_cents = ?, \
                 cover_image = ?, file_path = ?, status = ?, updated_at = ? WHERE id = ?",
            )
            .bind(product.vendor_id)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(&product.cover_image)
            .bind(&product.file_path)
            .bind(product.status.as_str())
            .bind(now)
            .bind(product.id)
            .execute(pool)
            .await
            .context("Failed to update product")?;
        });

        Ok(Product {
            updated_at: now,
            ..product.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "products", id).await
    }

    async fn slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "products", slug, except_id).await
    }

    async fn has_payments(&self, id: i64) -> Result<bool> {
        has_payments(&self.pool, "product_id", id).await
    }
}
