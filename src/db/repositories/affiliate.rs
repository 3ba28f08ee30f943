//! Affiliate program, link and commission repository

use crate::db::repositories::{delete_by_id, slug_taken};
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{
    ActiveStatus, AffiliateCommission, AffiliateLink, AffiliateProgram, CommissionStatus,
    ListParams, PagedResult,
};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait AffiliateRepository: Send + Sync {
    async fn create_program(&self, program: &AffiliateProgram) -> Result<AffiliateProgram>;
    async fn get_program(&self, id: i64) -> Result<Option<AffiliateProgram>>;
    async fn list_programs(
        &self,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<AffiliateProgram>>;
    async fn update_program(&self, program: &AffiliateProgram) -> Result<AffiliateProgram>;
    async fn delete_program(&self, id: i64) -> Result<bool>;
    async fn program_slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool>;

    async fn get_link(&self, id: i64) -> Result<Option<AffiliateLink>>;
    async fn get_link_by_code(&self, code: &str) -> Result<Option<AffiliateLink>>;
    async fn find_link(&self, program_id: i64, user_id: i64) -> Result<Option<AffiliateLink>>;
    async fn create_link(&self, program_id: i64, user_id: i64, code: &str) -> Result<AffiliateLink>;
    async fn list_links_for_user(&self, user_id: i64) -> Result<Vec<AffiliateLink>>;

    async fn get_commission(&self, id: i64) -> Result<Option<AffiliateCommission>>;
    async fn list_commissions(
        &self,
        status: Option<CommissionStatus>,
        affiliate_user_id: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<AffiliateCommission>>;
    /// Move a pending commission to paid; false when it was not pending
    async fn mark_paid(&self, id: i64) -> Result<bool>;
}

pub struct SqlxAffiliateRepository {
    pool: DynDatabasePool,
}

impl SqlxAffiliateRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AffiliateRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AffiliateRepository for SqlxAffiliateRepository {
    async fn create_program(&self, program: &AffiliateProgram) -> Result<AffiliateProgram> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO affiliate_programs (name, slug, description, product_id, commission_type, \
                 commission_value, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&program.name)
            .bind(&program.slug)
            .bind(&program.description)
            .bind(program.product_id)
            .bind(program.commission_type.as_str())
            .bind(program.commission_value)
            .bind(program.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create affiliate program")?
            .inserted_id()
        });

        Ok(AffiliateProgram {
            id,
            created_at: now,
            updated_at: now,
            ..program.clone()
        })
    }

    async fn get_program(&self, id: i64) -> Result<Option<AffiliateProgram>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateProgram>("SELECT * FROM affiliate_programs WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get affiliate program")
        })
    }

    async fn list_programs(
        &self,
        status: Option<ActiveStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<AffiliateProgram>> {
        let status = status.map(|s| s.as_str());
        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM affiliate_programs WHERE (? IS NULL OR status = ?)",
            )
            .bind(status)
            .bind(status)
            .fetch_one(pool)
            .await
            .context("Failed to count affiliate programs")?;
            let items = sqlx::query_as::<_, AffiliateProgram>(
                "SELECT * FROM affiliate_programs WHERE (? IS NULL OR status = ?) \
                 ORDER BY id DESC LIMIT ? OFFSET ?",
            )
            .bind(status)
            .bind(status)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list affiliate programs")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update_program(&self, program: &AffiliateProgram) -> Result<AffiliateProgram> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE affiliate_programs SET name = ?, slug = ?, description = ?, product_id = ?, \
                 commission_type = ?, commission_value = ?, status = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&program.name)
            .bind(&program.slug)
            .bind(&program.description)
            .bind(program.product_id)
            .bind(program.commission_type.as_str())
            .bind(program.commission_value)
            .bind(program.status.as_str())
            .bind(now)
            .bind(program.id)
            .execute(pool)
            .await
            .context("Failed to update affiliate program")?;
        });

        Ok(AffiliateProgram {
            updated_at: now,
            ..program.clone()
        })
    }

    async fn delete_program(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "affiliate_programs", id).await
    }

    async fn program_slug_taken(&self, slug: &str, except_id: Option<i64>) -> Result<bool> {
        slug_taken(&self.pool, "affiliate_programs", slug, except_id).await
    }

    async fn get_link(&self, id: i64) -> Result<Option<AffiliateLink>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateLink>("SELECT * FROM affiliate_links WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get affiliate link")
        })
    }

    async fn get_link_by_code(&self, code: &str) -> Result<Option<AffiliateLink>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateLink>("SELECT * FROM affiliate_links WHERE code = ?")
                .bind(code)
                .fetch_optional(pool)
                .await
                .context("Failed to get affiliate link by code")
        })
    }

    async fn find_link(&self, program_id: i64, user_id: i64) -> Result<Option<AffiliateLink>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateLink>(
                "SELECT * FROM affiliate_links WHERE program_id = ? AND user_id = ?",
            )
            .bind(program_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("Failed to find affiliate link")
        })
    }

    async fn create_link(&self, program_id: i64, user_id: i64, code: &str) -> Result<AffiliateLink> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO affiliate_links (program_id, user_id, code, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(program_id)
            .bind(user_id)
            .bind(code)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create affiliate link")?
            .inserted_id()
        });

        Ok(AffiliateLink {
            id,
            program_id,
            user_id,
            code: code.to_string(),
            created_at: now,
        })
    }

    async fn list_links_for_user(&self, user_id: i64) -> Result<Vec<AffiliateLink>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateLink>(
                "SELECT * FROM affiliate_links WHERE user_id = ? ORDER BY id DESC",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("Failed to list affiliate links")
        })
    }

    async fn get_commission(&self, id: i64) -> Result<Option<AffiliateCommission>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, AffiliateCommission>(
                "SELECT * FROM affiliate_commissions WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get commission")
        })
    }

    async fn list_commissions(
        &self,
        status: Option<CommissionStatus>,
        affiliate_user_id: Option<i64>,
        params: &ListParams,
    ) -> Result<PagedResult<AffiliateCommission>> {
        let status = status.map(|s| s.as_str());
        let filter = "WHERE (? IS NULL OR status = ?) AND (? IS NULL OR affiliate_user_id = ?)";
        let count_sql = format!("SELECT COUNT(*) FROM affiliate_commissions {}", filter);
        let list_sql = format!(
            "SELECT * FROM affiliate_commissions {} ORDER BY id DESC LIMIT ? OFFSET ?",
            filter
        );

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(affiliate_user_id)
                .bind(affiliate_user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count commissions")?;
            let items = sqlx::query_as::<_, AffiliateCommission>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(affiliate_user_id)
                .bind(affiliate_user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list commissions")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn mark_paid(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE affiliate_commissions SET status = ?, paid_at = ? WHERE id = ? AND status = ?",
            )
            .bind(CommissionStatus::Paid.as_str())
            .bind(Utc::now())
            .bind(id)
            .bind(CommissionStatus::Pending.as_str())
            .execute(pool)
            .await
            .context("Failed to mark commission paid")?
            .rows_affected()
        });
        Ok(affected > 0)
    }
}
