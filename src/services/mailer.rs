//! Outgoing mail
//!
//! Newsletters go out through the [`Mailer`] trait. Production uses SMTP via
//! lettre; [`MemoryMailer`] keeps messages in memory for tests and local runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::config::MailConfig;

/// A single outgoing HTML message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// `None` when mail is not configured
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html.clone())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Records messages instead of sending them
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: HashSet<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to these addresses fail
    pub fn failing_for<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        if self.failing.contains(&mail.to) {
            return Err(anyhow!("Mailbox unavailable: {}", mail.to));
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("Mailer lock poisoned"))?
            .push(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    #[test]
    fn test_smtp_disabled_without_host() {
        assert!(SmtpMailer::from_config(&MailConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_smtp_builds_when_configured() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            from_address: "news@example.com".to_string(),
            ..MailConfig::default()
        };
        assert!(SmtpMailer::from_config(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_mailer_records_and_fails() {
        let mailer = MemoryMailer::failing_for(["bad@example.com"]);
        mailer.send(&mail("ok@example.com")).await.unwrap();
        assert!(mailer.send(&mail("bad@example.com")).await.is_err());
        assert_eq!(mailer.sent(), vec![mail("ok@example.com")]);
    }
}
