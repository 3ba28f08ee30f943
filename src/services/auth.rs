//! Authentication service
//!
//! Registration, login with per-email rate limiting, session tokens and
//! token lookup. The first account ever registered becomes an admin.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{is_email, max_length, require, FormData};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::rate_limiter::LoginRateLimiter;

/// A freshly issued session
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    limiter: Arc<LoginRateLimiter>,
    session_days: i64,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        limiter: Arc<LoginRateLimiter>,
        session_days: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            limiter,
            session_days,
        }
    }

    pub async fn register(&self, form: &FormData) -> ServiceResult<AuthSession> {
        let name = form.text("name").unwrap_or_default().to_string();
        let email = form.text("email").unwrap_or_default().to_lowercase();
        let password = form.secret("password").unwrap_or_default();

        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &name);
        max_length(&mut errors, "name", &name, 255);
        validate_email(&mut errors, &email);
        validate_password(&mut errors, password);
        if !errors.has("email") && self.users.email_taken(&email, None).await? {
            errors.add("email", "The email has already been taken.");
        }
        errors.into_result()?;

        let role = if self.users.count().await? == 0 {
            UserRole::Admin
        } else {
            UserRole::Customer
        };
        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(&User::new(name, email, password_hash, role))
            .await?;
        tracing::info!("Registered user {} as {}", user.id, user.role);

        self.issue(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        let email = email.trim().to_lowercase();
        let mut errors = FieldErrors::new();
        require(&mut errors, "email", &email);
        require(&mut errors, "password", password);
        errors.into_result()?;

        if self.limiter.is_limited(&email).await {
            tracing::warn!("Login locked for {}", email);
            return Err(ServiceError::TooManyRequests(
                "Too many login attempts. Please try again later.".to_string(),
            ));
        }

        let user = match self.users.get_by_email(&email).await? {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                self.limiter.record_failure(&email).await;
                return Err(ServiceError::Unauthorized(
                    "These credentials do not match our records.".to_string(),
                ));
            }
        };

        if user.is_suspended() {
            return Err(ServiceError::Forbidden("Your account is suspended.".to_string()));
        }

        self.limiter.clear(&email).await;
        self.issue(user).await
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.sessions.delete(token).await?;
        Ok(())
    }

    /// User behind a token; expired sessions are removed and treated as absent
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Option<User>> {
        let Some(session) = self.sessions.get_by_id(token).await? else {
            return Ok(None);
        };
        if session.is_expired() {
            self.sessions.delete(&session.id).await?;
            return Ok(None);
        }
        Ok(self.users.get_by_id(session.user_id).await?)
    }

    /// Purge expired sessions and stale rate-limit entries
    pub async fn cleanup(&self) -> ServiceResult<u64> {
        let removed = self
            .sessions
            .delete_expired()
            .await
            .context("Failed to purge sessions")?;
        self.limiter.cleanup().await;
        Ok(removed)
    }

    async fn issue(&self, user: User) -> ServiceResult<AuthSession> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        let session = self.sessions.create(&session).await?;

        Ok(AuthSession {
            user,
            token: session.id,
            expires_at: session.expires_at,
        })
    }
}

pub(crate) fn validate_email(errors: &mut FieldErrors, email: &str) {
    require(errors, "email", email);
    if !email.is_empty() && !is_email(email) {
        errors.add("email", "The email must be a valid email address.");
    }
    max_length(errors, "email", email, 255);
}

pub(crate) fn validate_password(errors: &mut FieldErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("The password must be at least {} characters.", MIN_PASSWORD_LENGTH),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::models::UserStatus;
    use crate::services::testing;

    async fn service() -> AuthService {
        let pool = testing::pool().await;
        AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            Arc::new(LoginRateLimiter::new()),
            7,
        )
    }

    fn registration(name: &str, email: &str) -> FormData {
        FormData::new()
            .with("name", name)
            .with("email", email)
            .with("password", "secret-password")
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let auth = service().await;
        let first = auth.register(&registration("Ann", "ann@example.com")).await.unwrap();
        let second = auth.register(&registration("Bob", "BOB@example.com")).await.unwrap();

        assert_eq!(first.user.role, UserRole::Admin);
        assert_eq!(second.user.role, UserRole::Customer);
        assert_eq!(second.user.email, "bob@example.com");
        assert_eq!(first.token.len(), 32);
    }

    #[tokio::test]
    async fn test_register_collects_all_errors() {
        let auth = service().await;
        let form = FormData::new().with("email", "nope").with("password", "short");
        match auth.register(&form).await {
            Err(ServiceError::Validation(errors)) => {
                assert!(errors.has("name"));
                assert!(errors.has("email"));
                assert!(errors.has("password"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|s| s.user)),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let auth = service().await;
        auth.register(&registration("Ann", "ann@example.com")).await.unwrap();
        match auth.register(&registration("Ann 2", "Ann@Example.com")).await {
            Err(ServiceError::Validation(errors)) => assert!(errors.has("email")),
            other => panic!("expected validation error, got {:?}", other.map(|s| s.user)),
        }
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let auth = service().await;
        auth.register(&registration("Ann", "ann@example.com")).await.unwrap();

        let session = auth.login("ANN@example.com", "secret-password").await.unwrap();
        let user = auth.authenticate(&session.token).await.unwrap().unwrap();
        assert_eq!(user.email, "ann@example.com");

        auth.logout(&session.token).await.unwrap();
        assert!(auth.authenticate(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_suspended_user_cannot_login() {
        let auth = service().await;
        let session = auth.register(&registration("Ann", "ann@example.com")).await.unwrap();
        auth.sessions.delete_by_user(session.user.id).await.unwrap();

        let mut user = session.user.clone();
        user.status = UserStatus::Suspended;
        auth.users.update(&user).await.unwrap();

        match auth.login("ann@example.com", "secret-password").await {
            Err(ServiceError::Forbidden(message)) => assert_eq!(message, "Your account is suspended."),
            other => panic!("expected forbidden, got {:?}", other.map(|s| s.user)),
        }
        assert_eq!(auth.sessions.delete_by_user(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_password_whitespace_is_significant() {
        let auth = service().await;
        let form = registration("Ann", "ann@example.com").with("password", "  padded secret  ");
        auth.register(&form).await.unwrap();

        assert!(auth.login("ann@example.com", "  padded secret  ").await.is_ok());
        assert!(matches!(
            auth.login("ann@example.com", "padded secret").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_then_lockout() {
        let auth = service().await;
        auth.register(&registration("Ann", "ann@example.com")).await.unwrap();

        for _ in 0..5 {
            assert!(matches!(
                auth.login("ann@example.com", "wrong-password").await,
                Err(ServiceError::Unauthorized(_))
            ));
        }
        assert!(matches!(
            auth.login("ann@example.com", "secret-password").await,
            Err(ServiceError::TooManyRequests(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let pool = testing::pool().await;
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let auth = AuthService::new(
            SqlxUserRepository::boxed(pool),
            sessions.clone(),
            Arc::new(LoginRateLimiter::new()),
            -1,
        );
        let issued = auth.register(&registration("Ann", "ann@example.com")).await.unwrap();

        assert!(auth.authenticate(&issued.token).await.unwrap().is_none());
        assert!(sessions.get_by_id(&issued.token).await.unwrap().is_none());
    }
}
