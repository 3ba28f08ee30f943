//! Aggregate counts for the admin dashboard

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ActiveStatus, ApprovalStatus, CommissionStatus, ContentStatus};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Dashboard figures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub products: i64,
    pub published_products: i64,
    pub pending_payments: i64,
    /// Sum of approved payment amounts, in cents
    pub approved_revenue_cents: i64,
    pub published_blogs: i64,
    pub active_subscribers: i64,
    pub open_jobs: i64,
    pub pending_commissions: i64,
    pub active_ad_slots: i64,
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardStats>;
}

pub struct SqlxStatsRepository {
    pool: DynDatabasePool,
}

impl SqlxStatsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StatsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StatsRepository for SqlxStatsRepository {
    async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardStats> {
        // MySQL's SUM yields DECIMAL
        let revenue_sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions WHERE status = ?"
            }
            DatabaseDriver::Mysql => {
                "SELECT CAST(COALESCE(SUM(amount_cents), 0) AS SIGNED) FROM transactions WHERE status = ?"
            }
        };

        let stats = with_pool!(self.pool, |pool| {
            let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?;
            let products = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
                .fetch_one(pool)
                .await
                .context("Failed to count products")?;
            let published_products =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE status = ?")
                    .bind(ContentStatus::Published.as_str())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count published products")?;
            let pending_payments =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions WHERE status = ?")
                    .bind(ApprovalStatus::PendingApproval.as_str())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count pending payments")?;
            let approved_revenue_cents = sqlx::query_scalar::<_, i64>(revenue_sql)
                .bind(ApprovalStatus::Approved.as_str())
                .fetch_one(pool)
                .await
                .context("Failed to sum approved revenue")?;
            let published_blogs =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blogs WHERE status = ?")
                    .bind(ContentStatus::Published.as_str())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count published blogs")?;
            let active_subscribers = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM newsletter_subscribers WHERE is_active = ?",
            )
            .bind(true)
            .fetch_one(pool)
            .await
            .context("Failed to count subscribers")?;
            let open_jobs = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM job_postings WHERE status = ? AND (expires_at IS NULL OR expires_at > ?)",
            )
            .bind(ContentStatus::Published.as_str())
            .bind(now)
            .fetch_one(pool)
            .await
            .context("Failed to count open jobs")?;
            let pending_commissions = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM affiliate_commissions WHERE status = ?",
            )
            .bind(CommissionStatus::Pending.as_str())
            .fetch_one(pool)
            .await
            .context("Failed to count pending commissions")?;
            let active_ad_slots =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ad_slots WHERE status = ?")
                    .bind(ActiveStatus::Active.as_str())
                    .fetch_one(pool)
                    .await
                    .context("Failed to count ad slots")?;

            DashboardStats {
                users,
                products,
                published_products,
                pending_payments,
                approved_revenue_cents,
                published_blogs,
                active_subscribers,
                open_jobs,
                pending_commissions,
                active_ad_slots,
            }
        });

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        NewsletterRepository, ProductRepository, SqlxNewsletterRepository, SqlxProductRepository,
        SqlxTransactionRepository, SqlxUserRepository, TransactionRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{Product, Transaction, User, UserRole};

    #[tokio::test]
    async fn test_empty_database() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let stats = SqlxStatsRepository::new(pool).dashboard(Utc::now()).await.unwrap();
        assert_eq!(stats, DashboardStats::default());
    }

    #[tokio::test]
    async fn test_counts_and_revenue() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let admin = SqlxUserRepository::new(pool.clone())
            .create(&User::new("A".into(), "a@example.com".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let products = SqlxProductRepository::new(pool.clone());
        let mut published = Product::new("One".into(), "one".into());
        published.status = ContentStatus::Published;
        let one = products.create(&published).await.unwrap();
        let two = products
            .create(&Product::new("Two".into(), "two".into()))
            .await
            .unwrap();

        let transactions = SqlxTransactionRepository::new(pool.clone());
        let approved = transactions
            .create(&Transaction::new(admin.id, one.id, 1250, "R1".into()))
            .await
            .unwrap();
        transactions.approve(approved.id, admin.id, None).await.unwrap();
        transactions
            .create(&Transaction::new(admin.id, two.id, 999, "R2".into()))
            .await
            .unwrap();

        SqlxNewsletterRepository::new(pool.clone())
            .subscribe("reader@example.com")
            .await
            .unwrap();

        let stats = SqlxStatsRepository::new(pool).dashboard(Utc::now()).await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.products, 2);
        assert_eq!(stats.published_products, 1);
        assert_eq!(stats.pending_payments, 1);
        assert_eq!(stats.approved_revenue_cents, 1250);
        assert_eq!(stats.active_subscribers, 1);
    }
}
