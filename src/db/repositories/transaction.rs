//! Payment transaction repository
//!
//! Status transitions are conditional updates (`WHERE status =
//! 'PENDING_APPROVAL'`) checked by affected row count, so two reviewers
//! racing on the same payment cannot both win. Approval additionally grants
//! the product and records any affiliate commission in the same database
//! transaction.

use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{
    ApprovalStatus, LibraryEntry, ListParams, NewCommission, PagedResult, Transaction,
    TransactionFilter, TransactionSummary,
};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// What an approval changed
#[derive(Debug, Clone)]
pub struct Approval {
    pub library_entry: LibraryEntry,
    /// False when the buyer already owned the product
    pub library_created: bool,
    pub commission_id: Option<i64>,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn create(&self, transaction: &Transaction) -> Result<Transaction>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>>;
    /// Listing joined with buyer and product names, newest first
    async fn list(
        &self,
        filter: &TransactionFilter,
        params: &ListParams,
    ) -> Result<PagedResult<TransactionSummary>>;
    /// Whether the user has a payment awaiting review for this product
    async fn has_pending(&self, user_id: i64, product_id: i64) -> Result<bool>;
    /// Approve a pending payment. Returns `None` if it was not pending.
    async fn approve(
        &self,
        id: i64,
        reviewer_id: i64,
        commission: Option<NewCommission>,
    ) -> Result<Option<Approval>>;
    /// Reject a pending payment. Returns false if it was not pending.
    async fn reject(&self, id: i64, reviewer_id: i64, reason: Option<&str>) -> Result<bool>;
}

pub struct SqlxTransactionRepository {
    pool: DynDatabasePool,
}

impl SqlxTransactionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TransactionRepository> {
        Arc::new(Self::new(pool))
    }
}

const SUMMARY_SELECT: &str = "SELECT t.*, u.name AS user_name, u.email AS user_email, p.name AS product_name \
     FROM transactions t \
     JOIN users u ON u.id = t.user_id \
     JOIN products p ON p.id = t.product_id";

const LIST_FILTER: &str = "WHERE (? IS NULL OR t.status = ?) AND (? IS NULL OR t.user_id = ?)";

#[async_trait]
impl TransactionRepository for SqlxTransactionRepository {
    async fn create(&self, transaction: &Transaction) -> Result<Transaction> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO transactions (user_id, product_id, amount_cents, payment_reference, proof_image, \
                 affiliate_link_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(transaction.user_id)
            .bind(transaction.product_id)
            .bind(transaction.amount_cents)
            .bind(&transaction.payment_reference)
            .bind(&transaction.proof_image)
            .bind(transaction.affiliate_link_id)
            .bind(transaction.status.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create transaction")?
            .inserted_id()
        });

        Ok(Transaction {
            id,
            created_at: now,
            updated_at: now,
            ..transaction.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get transaction")
        })
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        params: &ListParams,
    ) -> Result<PagedResult<TransactionSummary>> {
        let status = filter.status.map(|s| s.as_str());
        let count_sql = format!(
            "SELECT COUNT(*) FROM transactions t {}",
            LIST_FILTER
        );
        let list_sql = format!(
            "{} {} ORDER BY t.id DESC LIMIT ? OFFSET ?",
            SUMMARY_SELECT, LIST_FILTER
        );

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(status)
                .bind(status)
                .bind(filter.user_id)
                .bind(filter.user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count transactions")?;
            let items = sqlx::query_as::<_, TransactionSummary>(&list_sql)
                .bind(status)
                .bind(status)
                .bind(filter.user_id)
                .bind(filter.user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list transactions")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn has_pending(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM transactions WHERE user_id = ? AND product_id = ? AND status = ?",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(ApprovalStatus::PendingApproval.as_str())
            .fetch_one(pool)
            .await
            .context("Failed to check pending transactions")?
        });
        Ok(count > 0)
    }

    async fn approve(
        &self,
        id: i64,
        reviewer_id: i64,
        commission: Option<NewCommission>,
    ) -> Result<Option<Approval>> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            let mut db_tx = pool.begin().await.context("Failed to begin transaction")?;

            let updated = sqlx::query(
                "UPDATE transactions SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(ApprovalStatus::Approved.as_str())
            .bind(reviewer_id)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(ApprovalStatus::PendingApproval.as_str())
            .execute(&mut *db_tx)
            .await
            .context("Failed to approve transaction")?
            .rows_affected();

            if updated == 0 {
                db_tx.rollback().await.context("Failed to roll back approval")?;
                return Ok(None);
            }

            let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *db_tx)
                .await
                .context("Failed to reload approved transaction")?;

            let existing = sqlx::query_as::<_, LibraryEntry>(
                "SELECT * FROM user_library WHERE user_id = ? AND product_id = ?",
            )
            .bind(transaction.user_id)
            .bind(transaction.product_id)
            .fetch_optional(&mut *db_tx)
            .await
            .context("Failed to look up library entry")?;

            let (library_entry, library_created) = match existing {
                Some(entry) => (entry, false),
                None => {
                    let entry_id = sqlx::query(
                        "INSERT INTO user_library (user_id, product_id, transaction_id, created_at) VALUES (?, ?, ?, ?)",
                    )
                    .bind(transaction.user_id)
                    .bind(transaction.product_id)
                    .bind(transaction.id)
                    .bind(now)
                    .execute(&mut *db_tx)
                    .await
                    .context("Failed to create library entry")?
                    .inserted_id();
                    let entry = LibraryEntry {
                        id: entry_id,
                        user_id: transaction.user_id,
                        product_id: transaction.product_id,
                        transaction_id: Some(transaction.id),
                        created_at: now,
                    };
                    (entry, true)
                }
            };

            let commission_id = match &commission {
                Some(c) => Some(
                    sqlx::query(
                        "INSERT INTO affiliate_commissions (program_id, link_id, affiliate_user_id, transaction_id, \
                         amount_cents, status, created_at) VALUES (?, ?, ?, ?, ?, 'pending', ?)",
                    )
                    .bind(c.program_id)
                    .bind(c.link_id)
                    .bind(c.affiliate_user_id)
                    .bind(c.transaction_id)
                    .bind(c.amount_cents)
                    .bind(now)
                    .execute(&mut *db_tx)
                    .await
                    .context("Failed to record affiliate commission")?
                    .inserted_id(),
                ),
                None => None,
            };

            db_tx.commit().await.context("Failed to commit approval")?;

            Ok(Some(Approval {
                library_entry,
                library_created,
                commission_id,
            }))
        })
    }

    async fn reject(&self, id: i64, reviewer_id: i64, reason: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        let updated = with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE transactions SET status = ?, reviewed_by = ?, reviewed_at = ?, rejection_reason = ?, \
                 updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(ApprovalStatus::Rejected.as_str())
            .bind(reviewer_id)
            .bind(now)
            .bind(reason)
            .bind(now)
            .bind(id)
            .bind(ApprovalStatus::PendingApproval.as_str())
            .execute(pool)
            .await
            .context("Failed to reject transaction")?
            .rows_affected()
        });
        Ok(updated > 0)
    }
}
