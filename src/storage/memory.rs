//! In-memory storage implementation for development and testing
//!
//! Keeps users and tokens in hash maps behind tokio `RwLock`s. Unique
//! indexes (email, digest) live under the same lock as their table, so the
//! uniqueness check and the write happen in one critical section.
//!
//! Lock order is always users, then tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::*;
use crate::auth::token::{Token, TokenDigest};
use crate::auth::user::User;
use crate::error::{Result, RustyKeysError};

#[derive(Default)]
struct UserTable {
    rows: HashMap<i64, User>,
    by_email: HashMap<String, i64>, // email -> user_id
    next_id: i64,
}

impl UserTable {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct TokenTable {
    rows: HashMap<i64, Token>,
    by_digest: HashMap<TokenDigest, i64>, // digest -> token_id
    next_id: i64,
}

impl TokenTable {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, token_id: i64) -> bool {
        match self.rows.remove(&token_id) {
            Some(token) => {
                self.by_digest.remove(&token.token_digest);
                true
            }
            None => false,
        }
    }

    fn remove_where<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> usize {
        let doomed: Vec<i64> = self
            .rows
            .values()
            .filter(|token| predicate(token))
            .map(|token| token.id)
            .collect();

        for id in &doomed {
            self.remove(*id);
        }
        doomed.len()
    }
}

/// In-memory combined storage provider
#[derive(Clone, Default)]
pub struct MemoryStorageProvider {
    users: Arc<RwLock<UserTable>>,
    tokens: Arc<RwLock<TokenTable>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl StorageProvider for MemoryStorageProvider {
    async fn initialize(&self) -> Result<()> {
        // Nothing to initialize for memory storage
        log::info!("Memory storage provider initialized");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        // Memory storage is always healthy
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl UserStorage for MemoryStorageProvider {
    async fn insert_user(&self, user: &User) -> Result<i64> {
        let mut users = self.users.write().await;

        if users.by_email.contains_key(&user.email) {
            return Err(RustyKeysError::ValidationError(format!(
                "email: {} is already registered",
                user.email
            )));
        }

        let id = users.allocate_id();
        let mut row = user.clone();
        row.id = id;
        users.by_email.insert(row.email.clone(), id);
        users.rows.insert(id, row);
        Ok(id)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.rows.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .by_email
            .get(email)
            .and_then(|id| users.rows.get(id))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut result: Vec<User> = users.rows.values().cloned().collect();
        newest_first(&mut result, |u| (u.created_at, u.id));
        Ok(result)
    }

    async fn update_user(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().await;

        let old_email = match users.rows.get(&user.id) {
            Some(existing) => existing.email.clone(),
            None => return Ok(false),
        };

        if old_email != user.email {
            if users.by_email.contains_key(&user.email) {
                return Err(RustyKeysError::ValidationError(format!(
                    "email: {} is already registered",
                    user.email
                )));
            }
            users.by_email.remove(&old_email);
            users.by_email.insert(user.email.clone(), user.id);
        }

        users.rows.insert(user.id, user.clone());
        Ok(true)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let mut users = self.users.write().await;
        let removed = match users.rows.remove(&user_id) {
            Some(user) => {
                users.by_email.remove(&user.email);
                true
            }
            None => false,
        };

        // Cascade while still holding the users lock
        let mut tokens = self.tokens.write().await;
        let cascaded = tokens.remove_where(|token| token.user_id == user_id);
        if cascaded > 0 {
            log::debug!("Cascaded deletion of {} tokens for user {}", cascaded, user_id);
        }

        Ok(removed)
    }
}

#[async_trait]
impl TokenStorage for MemoryStorageProvider {
    async fn insert_token(&self, token: &Token) -> Result<i64> {
        // Foreign key: hold the users read lock so the owner cannot vanish mid-insert
        let users = self.users.read().await;
        if !users.rows.contains_key(&token.user_id) {
            return Err(RustyKeysError::NotFound(format!("user {}", token.user_id)));
        }

        let mut tokens = self.tokens.write().await;
        if tokens.by_digest.contains_key(&token.token_digest) {
            return Err(RustyKeysError::Conflict(format!(
                "token digest {} already exists",
                token.token_digest.short()
            )));
        }

        let id = tokens.allocate_id();
        let mut row = token.clone();
        row.id = id;
        tokens.by_digest.insert(row.token_digest, id);
        tokens.rows.insert(id, row);
        Ok(id)
    }

    async fn get_token(&self, token_id: i64) -> Result<Option<Token>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.rows.get(&token_id).cloned())
    }

    async fn get_token_by_digest(&self, digest: &TokenDigest) -> Result<Option<Token>> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .by_digest
            .get(digest)
            .and_then(|id| tokens.rows.get(id))
            .cloned())
    }

    async fn list_user_tokens(&self, user_id: i64) -> Result<Vec<Token>> {
        let tokens = self.tokens.read().await;
        let mut result: Vec<Token> = tokens
            .rows
            .values()
            .filter(|token| token.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut result, |t| (t.created_at, t.id));
        Ok(result)
    }

    async fn delete_token(&self, token_id: i64) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.remove(token_id))
    }

    async fn delete_token_by_digest(&self, digest: &TokenDigest) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens.by_digest.get(digest).copied() {
            Some(id) => Ok(tokens.remove(id)),
            None => Ok(false),
        }
    }

    async fn delete_user_tokens(&self, user_id: i64) -> Result<usize> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.remove_where(|token| token.user_id == user_id))
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.remove_where(|token| token.is_expired_at(now)))
    }
}
