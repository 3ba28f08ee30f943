//! Blog post model

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::ContentStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Blog {
    pub id: i64,
    pub author_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    /// Markdown source
    pub content: String,
    /// Rendered HTML
    pub content_html: String,
    pub cover_image: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ContentStatus,
    /// Set the first time the post is published, then kept
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn new(title: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            author_id: None,
            title,
            slug,
            excerpt: None,
            content: String::new(),
            content_html: String::new(),
            cover_image: None,
            status: ContentStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
