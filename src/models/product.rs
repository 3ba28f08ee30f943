//! Digital product model

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::ContentStatus;

/// A downloadable product sold through manual payment approval.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub vendor_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    /// Cover image on the public disk
    pub cover_image: Option<String>,
    /// Deliverable on the private disk; only owners may download it
    #[serde(skip_serializing)]
    pub file_path: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            vendor_id: None,
            name,
            slug,
            description: String::new(),
            price_cents: 0,
            cover_image: None,
            file_path: None,
            status: ContentStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    pub fn has_file(&self) -> bool {
        self.file_path.is_some()
    }
}
