//! Newsletter and subscriber repository

use crate::db::repositories::delete_by_id;
use crate::db::{DynDatabasePool, InsertedId};
use crate::models::{ListParams, Newsletter, NewsletterStatus, NewsletterSubscriber, PagedResult};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait NewsletterRepository: Send + Sync {
    async fn create(&self, newsletter: &Newsletter) -> Result<Newsletter>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Newsletter>>;
    async fn list(
        &self,
        status: Option<NewsletterStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Newsletter>>;
    async fn update(&self, newsletter: &Newsletter) -> Result<Newsletter>;
    async fn delete(&self, id: i64) -> Result<bool>;
    /// Draft → sent with the delivered count; false if it was not a draft
    async fn mark_sent(&self, id: i64, recipients_count: i64) -> Result<bool>;

    async fn get_subscriber_by_email(&self, email: &str) -> Result<Option<NewsletterSubscriber>>;
    /// Insert the email, or re-activate it if it unsubscribed before
    async fn subscribe(&self, email: &str) -> Result<NewsletterSubscriber>;
    /// Returns false when the email was unknown or already inactive
    async fn unsubscribe(&self, email: &str) -> Result<bool>;
    async fn list_subscribers(
        &self,
        active: Option<bool>,
        params: &ListParams,
    ) -> Result<PagedResult<NewsletterSubscriber>>;
    async fn active_subscriber_emails(&self) -> Result<Vec<String>>;
    async fn delete_subscriber(&self, id: i64) -> Result<bool>;
}

pub struct SqlxNewsletterRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsletterRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsletterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsletterRepository for SqlxNewsletterRepository {
    async fn create(&self, newsletter: &Newsletter) -> Result<Newsletter> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO newsletters (subject, content, content_html, status, recipients_count, sent_at, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&newsletter.subject)
            .bind(&newsletter.content)
            .bind(&newsletter.content_html)
            .bind(newsletter.status.as_str())
            .bind(newsletter.recipients_count)
            .bind(newsletter.sent_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create newsletter")?
            .inserted_id()
        });

        Ok(Newsletter {
            id,
            created_at: now,
            updated_at: now,
            ..newsletter.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Newsletter>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Newsletter>("SELECT * FROM newsletters WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get newsletter")
        })
    }

    async fn list(
        &self,
        status: Option<NewsletterStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Newsletter>> {
        let status = status.map(|s| s.as_str());
        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM newsletters WHERE (? IS NULL OR status = ?)",
            )
            .bind(status)
            .bind(status)
            .fetch_one(pool)
            .await
            .context("Failed to count newsletters")?;
            let items = sqlx::query_as::<_, Newsletter>(
                "SELECT * FROM newsletters WHERE (? IS NULL OR status = ?) ORDER BY id DESC LIMIT ? OFFSET ?",
            )
            .bind(status)
            .bind(status)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list newsletters")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, newsletter: &Newsletter) -> Result<Newsletter> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE newsletters SET subject = ?, content = ?, content_html = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&newsletter.subject)
            .bind(&newsletter.content)
            .bind(&newsletter.content_html)
            .bind(now)
            .bind(newsletter.id)
            .execute(pool)
            .await
            .context("Failed to update newsletter")?;
        });

        Ok(Newsletter {
            updated_at: now,
            ..newsletter.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "newsletters", id).await
    }

    async fn mark_sent(&self, id: i64, recipients_count: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE newsletters SET status = ?, recipients_count = ?, sent_at = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(NewsletterStatus::Sent.as_str())
            .bind(recipients_count)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(NewsletterStatus::Draft.as_str())
            .execute(pool)
            .await
            .context("Failed to mark newsletter sent")?
            .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn get_subscriber_by_email(&self, email: &str) -> Result<Option<NewsletterSubscriber>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, NewsletterSubscriber>(
                "SELECT * FROM newsletter_subscribers WHERE email = ?",
            )
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get subscriber")
        })
    }

    async fn subscribe(&self, email: &str) -> Result<NewsletterSubscriber> {
        let now = Utc::now();
        if let Some(existing) = self.get_subscriber_by_email(email).await? {
            if !existing.is_active {
                with_pool!(self.pool, |pool| {
                    sqlx::query(
                        "UPDATE newsletter_subscribers SET is_active = ?, unsubscribed_at = NULL, updated_at = ? \
                         WHERE id = ?",
                    )
                    .bind(true)
                    .bind(now)
                    .bind(existing.id)
                    .execute(pool)
                    .await
                    .context("Failed to re-activate subscriber")?;
                });
                return Ok(NewsletterSubscriber {
                    is_active: true,
                    unsubscribed_at: None,
                    updated_at: now,
                    ..existing
                });
            }
            return Ok(existing);
        }

        let inserted = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO newsletter_subscribers (email, is_active, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(email)
            .bind(true)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|r| r.inserted_id())
        });

        match inserted {
            Ok(id) => Ok(NewsletterSubscriber {
                id,
                email: email.to_string(),
                is_active: true,
                unsubscribed_at: None,
                created_at: now,
                updated_at: now,
            }),
            // Lost a race with a concurrent subscribe of the same email.
            Err(err) => match self.get_subscriber_by_email(email).await? {
                Some(existing) => Ok(existing),
                None => Err(err).context("Failed to create subscriber"),
            },
        }
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool> {
        let now = Utc::now();
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE newsletter_subscribers SET is_active = ?, unsubscribed_at = ?, updated_at = ? \
                 WHERE email = ? AND is_active = ?",
            )
            .bind(false)
            .bind(now)
            .bind(now)
            .bind(email)
            .bind(true)
            .execute(pool)
            .await
            .context("Failed to unsubscribe")?
            .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_subscribers(
        &self,
        active: Option<bool>,
        params: &ListParams,
    ) -> Result<PagedResult<NewsletterSubscriber>> {
        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM newsletter_subscribers WHERE (? IS NULL OR is_active = ?)",
            )
            .bind(active)
            .bind(active)
            .fetch_one(pool)
            .await
            .context("Failed to count subscribers")?;
            let items = sqlx::query_as::<_, NewsletterSubscriber>(
                "SELECT * FROM newsletter_subscribers WHERE (? IS NULL OR is_active = ?) \
                 ORDER BY id DESC LIMIT ? OFFSET ?",
            )
            .bind(active)
            .bind(active)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list subscribers")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn active_subscriber_emails(&self) -> Result<Vec<String>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, String>(
                "SELECT email FROM newsletter_subscribers WHERE is_active = ? ORDER BY id",
            )
            .bind(true)
            .fetch_all(pool)
            .await
            .context("Failed to list subscriber emails")
        })
    }

    async fn delete_subscriber(&self, id: i64) -> Result<bool> {
        delete_by_id(&self.pool, "newsletter_subscribers", id).await
    }
}
