//! Admin user management
//!
//! Accounts created here skip the "first user is admin" rule of registration;
//! the role is whatever the admin picks.

use std::sync::Arc;

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{ListParams, PagedResult, User, UserFilter, UserRole, UserStatus};
use crate::services::auth::{validate_email, validate_password};
use crate::services::error::{FieldErrors, ServiceError, ServiceResult};
use crate::services::form::{max_length, require, FormData};
use crate::services::password::hash_password;
use crate::storage::{Disk, FileKind, StagedFiles, Storage};

const AVATAR_DIR: &str = "avatars";

pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    storage: Arc<Storage>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        storage: Arc<Storage>,
    ) -> Self {
        Self {
            users,
            sessions,
            storage,
        }
    }

    pub async fn list(&self, filter: &UserFilter, params: &ListParams) -> ServiceResult<PagedResult<User>> {
        Ok(self.users.list(filter, params).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    pub async fn create(&self, form: &FormData) -> ServiceResult<User> {
        let user = User::new(String::new(), String::new(), String::new(), UserRole::Customer);
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", form.text("name").unwrap_or_default());
        validate_password(&mut errors, form.secret("password").unwrap_or_default());
        self.save(user, form, errors, true).await
    }

    /// Partial update: absent fields keep their value
    pub async fn update(&self, id: i64, form: &FormData) -> ServiceResult<User> {
        let user = self.get(id).await?;
        let mut errors = FieldErrors::new();
        if form.has("name") {
            require(&mut errors, "name", form.text("name").unwrap_or_default());
        }
        if form.filled("password").is_some() {
            validate_password(&mut errors, form.secret("password").unwrap_or_default());
        }
        let was_suspended = user.is_suspended();
        let saved = self.save(user, form, errors, false).await?;

        if saved.is_suspended() && !was_suspended {
            let revoked = self.sessions.delete_by_user(saved.id).await?;
            tracing::info!("Suspended user {}, revoked {} sessions", saved.id, revoked);
        }
        Ok(saved)
    }

    /// Admins cannot delete their own account. Users with payments are
    /// suspended instead.
    pub async fn delete(&self, id: i64, acting_user_id: i64) -> ServiceResult<()> {
        if id == acting_user_id {
            return Err(ServiceError::InvalidState(
                "You cannot delete your own account.".to_string(),
            ));
        }
        let user = self.get(id).await?;
        if self.users.has_payments(id).await? {
            return Err(ServiceError::InvalidState(
                "This user has payments and cannot be deleted.".to_string(),
            ));
        }
        self.users.delete(id).await?;
        if let Some(avatar) = &user.avatar {
            self.storage.delete(Disk::Public, avatar).await;
        }
        Ok(())
    }

    async fn save(
        &self,
        mut user: User,
        form: &FormData,
        mut errors: FieldErrors,
        creating: bool,
    ) -> ServiceResult<User> {
        if let Some(name) = form.text("name") {
            user.name = name.to_string();
            max_length(&mut errors, "name", name, 255);
        }
        if creating || form.has("email") {
            let email = form.text("email").unwrap_or_default().to_lowercase();
            validate_email(&mut errors, &email);
            let except = (!creating).then_some(user.id);
            if !errors.has("email") && self.users.email_taken(&email, except).await? {
                errors.add("email", "The email has already been taken.");
            }
            user.email = email;
        }
        if let Some(role) = form.choice::<UserRole>("role", &mut errors) {
            user.role = role;
        }
        if let Some(status) = form.choice::<UserStatus>("status", &mut errors) {
            user.status = status;
        }
        let avatar = self
            .storage
            .change_for(form, "avatar", FileKind::Image, &mut errors);
        errors.into_result()?;

        if let Some(password) = form.filled("password").and(form.secret("password")) {
            user.password_hash = hash_password(password)?;
        }

        let mut staged = StagedFiles::default();
        self.storage
            .apply(&mut staged, Disk::Public, AVATAR_DIR, avatar, &mut user.avatar)
            .await?;
        let result = if creating {
            self.users.create(&user).await
        } else {
            self.users.update(&user).await
        };
        staged.finish(&self.storage, result.is_ok()).await;

        Ok(result?)
    }
}
