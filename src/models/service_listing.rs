//! Service listing model (freelance/agency offerings)

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::ActiveStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceListing {
    pub id: i64,
    pub provider_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub delivery_days: i64,
    pub image: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ActiveStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceListing {
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            provider_id: None,
            name,
            slug,
            description: String::new(),
            price_cents: 0,
            delivery_days: 1,
            image: None,
            status: ActiveStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
