//! User library repository: which products each user owns

use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{LibraryEntry, LibraryItem, ListParams, PagedResult};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn find(&self, user_id: i64, product_id: i64) -> Result<Option<LibraryEntry>>;
    /// Owned products with their details, most recently acquired first
    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<LibraryItem>>;
    /// First-or-create; the flag is true when a row was inserted
    async fn grant(
        &self,
        user_id: i64,
        product_id: i64,
        transaction_id: Option<i64>,
    ) -> Result<(LibraryEntry, bool)>;
    async fn revoke(&self, user_id: i64, product_id: i64) -> Result<bool>;
}

pub struct SqlxLibraryRepository {
    pool: DynDatabasePool,
}

impl SqlxLibraryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LibraryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LibraryRepository for SqlxLibraryRepository {
    async fn find(&self, user_id: i64, product_id: i64) -> Result<Option<LibraryEntry>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, LibraryEntry>(
                "SELECT * FROM user_library WHERE user_id = ? AND product_id = ?",
            )
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get library entry")
        })
    }

    async fn list_for_user(&self, user_id: i64, params: &ListParams) -> Result<PagedResult<LibraryItem>> {
        let (mut items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_library WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count library entries")?;
            let items = sqlx::query_as::<_, LibraryItem>(
                "SELECT l.id, l.product_id, l.transaction_id, l.created_at AS acquired_at, \
                 p.name AS product_name, p.slug AS product_slug, p.cover_image AS product_cover_image, \
                 p.file_path AS product_file_path \
                 FROM user_library l JOIN products p ON p.id = l.product_id \
                 WHERE l.user_id = ? ORDER BY l.id DESC LIMIT ? OFFSET ?",
            )
            .bind(user_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list library")?;
            (items, total)
        });

        for item in &mut items {
            item.has_file = item.product_file_path.is_some();
        }

        Ok(PagedResult::new(items, total, params))
    }

    async fn grant(
        &self,
        user_id: i64,
        product_id: i64,
        transaction_id: Option<i64>,
    ) -> Result<(LibraryEntry, bool)> {
        if let Some(existing) = self.find(user_id, product_id).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let inserted = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO user_library (user_id, product_id, transaction_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(transaction_id)
            .bind(now)
            .execute(pool)
            .await
            .map(|result| result.inserted_id())
        });

        match inserted {
            Ok(id) => Ok((
                LibraryEntry {
                    id,
                    user_id,
                    product_id,
                    transaction_id,
                    created_at: now,
                },
                true,
            )),
            // Lost a race against a concurrent grant: the unique key kept one row.
            Err(err) => match self.find(user_id, product_id).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(err).context("Failed to create library entry"),
            },
        }
    }

    async fn revoke(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM user_library WHERE user_id = ? AND product_id = ?")
                .bind(user_id)
                .bind(product_id)
                .execute(pool)
                .await
                .context("Failed to revoke library entry")?
                .rows_affected()
        });
        Ok(affected > 0)
    }
}
