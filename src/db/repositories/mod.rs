//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod ad;
pub mod affiliate;
pub mod blog;
pub mod job_posting;
pub mod library;
pub mod newsletter;
pub mod product;
pub mod service_listing;
pub mod session;
pub mod sponsorship;
pub mod stats;
pub mod transaction;
pub mod user;

pub use ad::{AdRepository, SqlxAdRepository};
pub use affiliate::{AffiliateRepository, SqlxAffiliateRepository};
pub use blog::{BlogRepository, SqlxBlogRepository};
pub use job_posting::{JobPostingRepository, SqlxJobPostingRepository};
pub use library::{LibraryRepository, SqlxLibraryRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use service_listing::{ServiceListingRepository, SqlxServiceListingRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use sponsorship::{SponsorshipRepository, SqlxSponsorshipRepository};
pub use stats::{DashboardStats, SqlxStatsRepository, StatsRepository};
pub use transaction::{Approval, SqlxTransactionRepository, TransactionRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::db::DynDatabasePool;
use crate::with_pool;
use anyhow::Result;

/// Whether `slug` is used in `table` by a row other than `except_id`.
///
/// `table` must be a trusted identifier, never user input.
pub(crate) async fn slug_taken(
    pool: &DynDatabasePool,
    table: &'static str,
    slug: &str,
    except_id: Option<i64>,
) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE slug = ? AND (? IS NULL OR id <> ?)",
        table
    );
    let count = with_pool!(pool, |db| {
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(slug)
            .bind(except_id)
            .bind(except_id)
            .fetch_one(db)
            .await
            .with_context(|| format!("Failed to check slug in {}", table))?
    });
    Ok(count > 0)
}

/// Whether a payment references `id` through `column` of `transactions`.
///
/// `column` must be a trusted identifier, never user input.
pub(crate) async fn has_payments(pool: &DynDatabasePool, column: &'static str, id: i64) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM transactions WHERE {} = ?", column);
    let count = with_pool!(pool, |db| {
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(db)
            .await
            .with_context(|| format!("Failed to count payments by {}", column))?
    });
    Ok(count > 0)
}

/// Delete a row by primary key; returns false when nothing was deleted.
pub(crate) async fn delete_by_id(pool: &DynDatabasePool, table: &'static str, id: i64) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    let affected = with_pool!(pool, |db| {
        sqlx::query(&sql)
            .bind(id)
            .execute(db)
            .await
            .with_context(|| format!("Failed to delete from {}", table))?
            .rows_affected()
    });
    Ok(affected > 0)
}
