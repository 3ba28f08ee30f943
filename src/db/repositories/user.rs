//! User repository
//!
//! - `UserRepository` defines user data access
//! - `SqlxUserRepository` implements it for SQLite and MySQL

use crate::db::repositories::has_payments;
use crate::db::{like_pattern, DynDatabasePool, InsertedId};
use crate::models::{ListParams, PagedResult, User, UserFilter};
use crate::with_pool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (exact match; emails are stored lowercase)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Whether another user already uses this email
    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool>;

    /// Paginated, filtered listing, newest first
    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<PagedResult<User>>;

    /// Persist all mutable columns of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user; returns false if no row existed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count all users
    async fn count(&self) -> Result<i64>;

    /// Whether the user ever submitted a payment
    async fn has_payments(&self, id: i64) -> Result<bool>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_FILTER: &str = "WHERE (? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!') \
     AND (? IS NULL OR role = ?) \
     AND (? IS NULL OR status = ?)";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO users (name, email, password_hash, role, status, avatar, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(&user.avatar)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by id")
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by email")
        })
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool> {
        let count: i64 = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ? AND (? IS NULL OR id <> ?)")
                .bind(email)
                .bind(except_id)
                .bind(except_id)
                .fetch_one(pool)
                .await
                .context("Failed to check user email")?
        });
        Ok(count > 0)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<PagedResult<User>> {
        let pattern = filter.q.as_deref().map(like_pattern);
        let role = filter.role.map(|r| r.as_str());
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM users {}", LIST_FILTER);
        let list_sql = format!(
            "SELECT * FROM users {} ORDER BY id DESC LIMIT ? OFFSET ?",
            LIST_FILTER
        );

        let (items, total) = with_pool!(self.pool, |pool| {
            let total = sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(role)
                .bind(role)
                .bind(status)
                .bind(status)
                .fetch_one(pool)
                .await
                .context("Failed to count users")?;
            let items = sqlx::query_as::<_, User>(&list_sql)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(role)
                .bind(role)
                .bind(status)
                .bind(status)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list users")?;
            (items, total)
        });

        Ok(PagedResult::new(items, total, params))
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, status = ?, \
                 avatar = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(&user.avatar)
            .bind(now)
            .bind(user.id)
            .execute(pool)
            .await
            .context("Failed to update user")?;
        });

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")
        })
    }

    async fn has_payments(&self, id: i64) -> Result<bool> {
        has_payments(&self.pool, "user_id", id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use crate::models::{UserRole, UserStatus};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn user(name: &str, email: &str, role: UserRole) -> User {
        User::new(name.to_string(), email.to_string(), "hash".to_string(), role)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&user("Ada", "ada@example.com", UserRole::Admin)).await.unwrap();
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");
        assert_eq!(by_id.role, UserRole::Admin);

        let by_email = repo.get_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_email_taken() {
        let repo = setup_test_repo().await;
        let created = repo.create(&user("Ada", "ada@example.com", UserRole::Customer)).await.unwrap();

        assert!(repo.email_taken("ada@example.com", None).await.unwrap());
        assert!(!repo.email_taken("ada@example.com", Some(created.id)).await.unwrap());
        assert!(!repo.email_taken("bob@example.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let repo = setup_test_repo().await;
        repo.create(&user("Ada Admin", "ada@example.com", UserRole::Admin)).await.unwrap();
        repo.create(&user("Bob Buyer", "bob@example.com", UserRole::Customer)).await.unwrap();
        repo.create(&user("Cy Seller", "cy@shop.io", UserRole::Vendor)).await.unwrap();

        let all = repo.list(&UserFilter::default(), &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.last_page(), 2);
        // newest first
        assert_eq!(all.items[0].name, "Cy Seller");

        let filter = UserFilter { q: Some("example".into()), ..Default::default() };
        let searched = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(searched.total, 2);

        let filter = UserFilter { role: Some(UserRole::Vendor), ..Default::default() };
        let vendors = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(vendors.total, 1);
        assert_eq!(vendors.items[0].email, "cy@shop.io");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let repo = setup_test_repo().await;
        repo.create(&user("Ada", "ada@example.com", UserRole::Customer)).await.unwrap();

        let filter = UserFilter { q: Some("%".into()), ..Default::default() };
        let result = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&user("Ada", "ada@example.com", UserRole::Customer)).await.unwrap();

        created.status = UserStatus::Suspended;
        created.name = "Ada L.".to_string();
        repo.update(&created).await.unwrap();

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, UserStatus::Suspended);
        assert_eq!(fetched.name, "Ada L.");

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
