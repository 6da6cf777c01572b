//! Abstract storage interfaces for pluggable backends
//!
//! A backend only has to offer get/insert/update/delete by primary key,
//! lookup by an indexed equality condition, and ordering by a timestamp
//! column. Uniqueness of user emails and token digests must be enforced
//! atomically by the backend itself, and deleting a user must delete the
//! user's tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::token::{Token, TokenDigest};
use crate::auth::user::User;
use crate::error::Result;

/// User data storage interface
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Insert a user and return the new id; `user.id` is ignored.
    /// A duplicate email fails with `ValidationError`.
    async fn insert_user(&self, user: &User) -> Result<i64>;

    /// Get user by ID
    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Get user by (normalised) email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, newest first
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Overwrite a user row; `Ok(false)` when no such user exists.
    /// A duplicate email fails with `ValidationError`.
    async fn update_user(&self, user: &User) -> Result<bool>;

    /// Delete a user and every token it owns; `Ok(false)` when absent
    async fn delete_user(&self, user_id: i64) -> Result<bool>;
}

/// Token metadata storage interface
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Insert a token and return the new id; `token.id` is ignored.
    /// A duplicate digest fails with `Conflict`, an unknown owner with `NotFound`.
    async fn insert_token(&self, token: &Token) -> Result<i64>;

    /// Get token by ID
    async fn get_token(&self, token_id: i64) -> Result<Option<Token>>;

    /// Get token by digest
    async fn get_token_by_digest(&self, digest: &TokenDigest) -> Result<Option<Token>>;

    /// Tokens owned by a user, newest first, expired ones included
    async fn list_user_tokens(&self, user_id: i64) -> Result<Vec<Token>>;

    /// `Ok(false)` when the token did not exist
    async fn delete_token(&self, token_id: i64) -> Result<bool>;

    /// `Ok(false)` when the token did not exist
    async fn delete_token_by_digest(&self, digest: &TokenDigest) -> Result<bool>;

    /// Delete every token of a user, returning how many were removed
    async fn delete_user_tokens(&self, user_id: i64) -> Result<usize>;

    /// Delete tokens whose expiry is at or before `now`
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Combined storage provider interface
#[async_trait]
pub trait StorageProvider: UserStorage + TokenStorage {
    /// Initialize the storage backend (create tables, etc.)
    async fn initialize(&self) -> Result<()>;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<bool>;

    /// Backend name for logging
    fn provider_name(&self) -> &'static str;
}
