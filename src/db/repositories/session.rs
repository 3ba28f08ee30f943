//! Session repository
//!
//! Sessions are keyed by their random token; expired rows are purged by the
//! background cleanup task and on lookup.

use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete expired sessions
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
                .bind(&session.id)
                .bind(session.user_id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .execute(pool)
                .await
                .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get session")
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        with_pool!(self.pool, |pool| {
            Ok(sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to delete user sessions")?
                .rows_affected())
        })
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            Ok(sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected())
        })
    }
}
