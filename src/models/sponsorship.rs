//! Sponsored posts

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::ContentStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SponsorshipPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub sponsor_name: String,
    pub sponsor_url: String,
    pub content: String,
    pub content_html: String,
    pub image: Option<String>,
    pub price_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SponsorshipPost {
    pub fn new(title: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            slug,
            sponsor_name: String::new(),
            sponsor_url: String::new(),
            content: String::new(),
            content_html: String::new(),
            image: None,
            price_cents: 0,
            status: ContentStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
