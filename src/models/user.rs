//! User model
//!
//! Accounts for admins, vendors and customers. The password hash never leaves
//! the server: it is skipped during serialization.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::common::string_enum;

/// Registered user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Email address (unique, stored lowercase)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    /// Avatar path on the public disk
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed (see `services::password`).
    pub fn new(name: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }
}

/// Filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring of name or email
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

string_enum! {
    /// User role for authorization
    UserRole ("user role") {
        Admin => "admin",
        Vendor => "vendor",
        Customer => "customer",
    }
    default = Customer
}

string_enum! {
    /// Account state; suspended users cannot log in
    UserStatus ("user status") {
        Active => "active",
        Suspended => "suspended",
    }
    default = Active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new_defaults() {
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            "hash".to_string(),
            UserRole::Customer,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.avatar.is_none());
        assert!(!user.is_admin());
        assert!(!user.is_suspended());
    }

    #[test]
    fn test_is_admin() {
        let admin = User::new("A".into(), "a@x.io".into(), "h".into(), UserRole::Admin);
        let vendor = User::new("V".into(), "v@x.io".into(), "h".into(), UserRole::Vendor);

        assert!(admin.is_admin());
        assert!(!vendor.is_admin());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("A".into(), "a@x.io".into(), "secret-hash".into(), UserRole::Admin);
        let json = serde_json::to_value(&user).unwrap();

        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
        assert_eq!(json["status"], "active");
    }
}
