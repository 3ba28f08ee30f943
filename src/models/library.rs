//! User library: products a user owns

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ownership row; unique per (user, product)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LibraryEntry {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Library entry with the product details a customer needs
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LibraryItem {
    pub id: i64,
    pub product_id: i64,
    pub transaction_id: Option<i64>,
    pub acquired_at: DateTime<Utc>,
    pub product_name: String,
    pub product_slug: String,
    pub product_cover_image: Option<String>,
    #[serde(skip_serializing)]
    pub product_file_path: Option<String>,
    #[sqlx(skip)]
    pub has_file: bool,
}
