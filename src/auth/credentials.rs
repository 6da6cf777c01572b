//! User records and password verification

use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::user::{normalize_email, NewUser, User, UserUpdate};
use crate::clock::Clock;
use crate::error::{Result, RustyKeysError};
use crate::storage::UserStorage;

/// Manages user records and their password digests
pub struct CredentialStore {
    users: Arc<dyn UserStorage>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStorage>, hasher: PasswordHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    /// Register a user; the password is hashed before anything is persisted
    pub async fn create(&self, profile: NewUser, password: &str) -> Result<User> {
        let profile = profile.validated()?;
        if password.is_empty() {
            return Err(RustyKeysError::ValidationError(
                "password: this field is required".to_string(),
            ));
        }

        let password_digest = self.hash(password).await?;
        let now = self.clock.now();
        let mut user = User {
            id: 0,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            password_digest,
            active: profile.active,
            created_at: now,
            updated_at: now,
        };

        user.id = self.users.insert_user(&user).await?;
        log::debug!("Created user {}", user.id);
        Ok(user)
    }

    /// True iff `candidate` hashes to `stored_digest`. Hashing runs on the
    /// blocking pool, off the async workers.
    pub async fn verify(&self, stored_digest: &str, candidate: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let stored_digest = stored_digest.to_string();
        let candidate = candidate.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&stored_digest, &candidate)).await?
    }

    async fn hash(&self, password: &str) -> Result<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    /// Hash a throwaway password; used to equalise timing for unknown accounts.
    /// Called once at construction, outside any request.
    pub(crate) fn hash_decoy(&self, password: &str) -> Result<String> {
        self.hasher.hash(password)
    }

    pub async fn find(&self, user_id: i64) -> Result<User> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| RustyKeysError::NotFound(format!("user {}", user_id)))
    }

    pub async fn by_email(&self, email: &str) -> Result<User> {
        // Anything that cannot be an address cannot be registered either
        let email = normalize_email(email)
            .map_err(|_| RustyKeysError::NotFound("user with that email".to_string()))?;

        self.users
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| RustyKeysError::NotFound("user with that email".to_string()))
    }

    /// Every user, newest first
    pub async fn all(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }

    pub async fn update(&self, user_id: i64, update: UserUpdate) -> Result<User> {
        let mut user = self.find(user_id).await?;
        update.apply_to(&mut user)?;
        user.updated_at = self.clock.now();
        self.persist(&user).await?;
        Ok(user)
    }

    pub async fn reset_password(&self, user_id: i64, new_password: &str) -> Result<()> {
        if new_password.is_empty() {
            return Err(RustyKeysError::ValidationError(
                "password: this field is required".to_string(),
            ));
        }

        let mut user = self.find(user_id).await?;
        user.password_digest = self.hash(new_password).await?;
        user.updated_at = self.clock.now();
        self.persist(&user).await?;
        log::debug!("Password reset for user {}", user_id);
        Ok(())
    }

    /// Delete a user and, through the backend, all of its tokens.
    /// Deleting an absent user is not an error.
    pub async fn delete(&self, user_id: i64) -> Result<bool> {
        self.users.delete_user(user_id).await
    }

    async fn persist(&self, user: &User) -> Result<()> {
        if self.users.update_user(user).await? {
            Ok(())
        } else {
            // Deleted between load and write
            Err(RustyKeysError::NotFound(format!("user {}", user.id)))
        }
    }
}
