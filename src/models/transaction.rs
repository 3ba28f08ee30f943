//! Payment transaction model
//!
//! A customer submits proof of an off-platform payment; an admin then moves
//! the transaction from `PENDING_APPROVAL` to `APPROVED` or `REJECTED`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::ApprovalStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    /// Product price at submission time
    pub amount_cents: i64,
    pub payment_reference: String,
    /// Payment proof on the public disk
    pub proof_image: Option<String>,
    pub affiliate_link_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A new submission awaiting review
    pub fn new(user_id: i64, product_id: i64, amount_cents: i64, payment_reference: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            product_id,
            amount_cents,
            payment_reference,
            proof_image: None,
            affiliate_link_id: None,
            status: ApprovalStatus::PendingApproval,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::PendingApproval
    }
}

/// Transaction joined with buyer and product names, for admin listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TransactionSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub transaction: Transaction,
    pub user_name: String,
    pub user_email: String,
    pub product_name: String,
}

/// Filters for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<ApprovalStatus>,
    pub user_id: Option<i64>,
}
