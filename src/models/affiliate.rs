//! Affiliate programs, links and commissions

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::{string_enum, ActiveStatus};

string_enum! {
    /// How `commission_value` is interpreted
    CommissionType ("commission type") {
        /// Basis points of the sale amount (1000 = 10%)
        Percentage => "percentage",
        /// Flat amount in cents, capped at the sale amount
        Fixed => "fixed",
    }
    default = Percentage
}

string_enum! {
    CommissionStatus ("commission status") {
        Pending => "pending",
        Paid => "paid",
    }
    default = Pending
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AffiliateProgram {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// When set, only sales of this product earn commission
    pub product_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub commission_type: CommissionType,
    pub commission_value: i64,
    #[sqlx(try_from = "String")]
    pub status: ActiveStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AffiliateProgram {
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            slug,
            description: String::new(),
            product_id: None,
            commission_type: CommissionType::Percentage,
            commission_value: 0,
            status: ActiveStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ActiveStatus::Active
    }

    /// Whether a sale of `product_id` is covered by this program
    pub fn covers(&self, product_id: i64) -> bool {
        self.product_id.map_or(true, |id| id == product_id)
    }
}

/// A user's referral link into a program
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AffiliateLink {
    pub id: i64,
    pub program_id: i64,
    pub user_id: i64,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AffiliateCommission {
    pub id: i64,
    pub program_id: i64,
    pub link_id: i64,
    pub affiliate_user_id: i64,
    pub transaction_id: i64,
    pub amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Commission to record for an approved sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommission {
    pub program_id: i64,
    pub link_id: i64,
    pub affiliate_user_id: i64,
    pub transaction_id: i64,
    pub amount_cents: i64,
}
