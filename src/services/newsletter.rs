//! Newsletters and their subscribers

use anyhow::anyhow;
use std::sync::Arc;

use crate::db::repositories::NewsletterRepository;
use crate::models::{ListParams, Newsletter, NewsletterStatus, NewsletterSubscriber, PagedResult};
use crate::services::auth::validate_email;
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, require, FormData};
use crate::services::mailer::{Mailer, OutgoingMail};
use crate::services::markdown::MarkdownRenderer;

/// Outcome of a send
#[derive(Debug, Clone)]
pub struct Delivery {
    pub newsletter: Newsletter,
    pub delivered: usize,
    pub failed: usize,
}

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
    mailer: Option<Arc<dyn Mailer>>,
    renderer: MarkdownRenderer,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self {
            repo,
            mailer,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn list(
        &self,
        status: Option<NewsletterStatus>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Newsletter>> {
        Ok(self.repo.list(status, params).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Newsletter> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Newsletter"))
    }

    pub async fn create(&self, form: &FormData) -> ServiceResult<Newsletter> {
        let newsletter = Newsletter::new(String::new());
        self.save(newsletter, form, true).await
    }

    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<Newsletter> {
        let newsletter = self.get(id).await?;
        if newsletter.is_sent() {
            return Err(ServiceError::InvalidState(
                "A sent newsletter cannot be edited.".to_string(),
            ));
        }
        self.save(newsletter, form, false).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete(id).await? {
            return Err(ServiceError::NotFound("Newsletter"));
        }
        Ok(())
    }

    async fn save(&self, mut newsletter: Newsletter, form: &FormData, creating: bool) -> ServiceResult<Newsletter> {
        let mut errors = FieldErrors::new();
        if creating || form.has("subject") {
            let subject = form.text("subject").unwrap_or_default();
            require(&mut errors, "subject", subject);
            max_length(&mut errors, "subject", subject, 255);
            newsletter.subject = subject.to_string();
        }
        if creating || form.has("content") {
            let content = form.text("content").unwrap_or_default();
            require(&mut errors, "content", content);
            newsletter.content = content.to_string();
        }
        errors.into_result()?;

        newsletter.content_html = self.renderer.render(&newsletter.content);
        let newsletter = if creating {
            self.repo.create(&newsletter).await?
        } else {
            self.repo.update(&newsletter).await?
        };
        Ok(newsletter)
    }

    /// Mail a draft to every active subscriber.
    ///
    /// Failed deliveries are skipped. When subscribers exist and none of them
    /// could be reached the newsletter stays a draft.
    pub async fn send(&self, id: i64) -> ServiceResult<Delivery> {
        let newsletter = self.get(id).await?;
        if newsletter.is_sent() {
            return Err(ServiceError::InvalidState(
                "This newsletter has already been sent.".to_string(),
            ));
        }
        let mailer = self.mailer.as_ref().ok_or_else(|| {
            ServiceError::InvalidState("Mail delivery is not configured.".to_string())
        })?;

        let recipients = self.repo.active_subscriber_emails().await?;
        let html = self.renderer.render(&newsletter.content);
        let mut delivered = 0;
        let mut failed = 0;
        for to in recipients {
            let mail = OutgoingMail {
                to,
                subject: newsletter.subject.clone(),
                html: html.clone(),
            };
            match mailer.send(&mail).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Newsletter {} not delivered to {}: {}", id, mail.to, e);
                }
            }
        }

        if delivered == 0 && failed > 0 {
            return Err(anyhow!("Newsletter {} could not be delivered to any of {} subscribers", id, failed).into());
        }
        if !self.repo.mark_sent(id, delivered as i64).await? {
            return Err(ServiceError::InvalidState(
                "This newsletter has already been sent.".to_string(),
            ));
        }
        tracing::info!("Newsletter {} sent to {} subscribers ({} failed)", id, delivered, failed);

        Ok(Delivery {
            newsletter: self.get(id).await?,
            delivered,
            failed,
        })
    }

    // ========================================================================
    // Subscribers
    // ========================================================================

    pub async fn subscribe(&self, email: &str) -> ServiceResult<NewsletterSubscriber> {
        let email = normalize_email(email)?;
        Ok(self.repo.subscribe(&email).await?)
    }

    /// Unknown addresses are accepted silently
    pub async fn unsubscribe(&self, email: &str) -> ServiceResult<()> {
        let email = normalize_email(email)?;
        if self.repo.unsubscribe(&email).await? {
            tracing::debug!("Unsubscribed {}", email);
        }
        Ok(())
    }

    pub async fn list_subscribers(
        &self,
        active: Option<bool>,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<NewsletterSubscriber>> {
        Ok(self.repo.list_subscribers(active, params).await?)
    }

    pub async fn delete_subscriber(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.delete_subscriber(id).await? {
            return Err(ServiceError::NotFound("Subscriber"));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    let mut errors = FieldErrors::new();
    validate_email(&mut errors, &email);
    errors.into_result()?;
    Ok(email)
}
