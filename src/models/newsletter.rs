//! Newsletters and their subscribers

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::string_enum;

string_enum! {
    NewsletterStatus ("newsletter status") {
        Draft => "draft",
        Sent => "sent",
    }
    default = Draft
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Newsletter {
    pub id: i64,
    pub subject: String,
    /// Markdown source
    pub content: String,
    pub content_html: String,
    #[sqlx(try_from = "String")]
    pub status: NewsletterStatus,
    /// Number of successful deliveries
    pub recipients_count: i64,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Newsletter {
    pub fn new(subject: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            subject,
            content: String::new(),
            content_html: String::new(),
            status: NewsletterStatus::Draft,
            recipients_count: 0,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == NewsletterStatus::Sent
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NewsletterSubscriber {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
