//! Token persistence
//!
//! A thin, expiry-agnostic layer over `TokenStorage`: it stores and finds
//! tokens but never judges whether they are still valid.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::auth::token::{GeneratedToken, Token, TokenDigest};
use crate::error::{Result, RustyKeysError};
use crate::storage::TokenStorage;

pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Persist a generated token. The digest uniqueness constraint is the
    /// backend's; a collision surfaces as `Conflict`.
    pub async fn insert(&self, generated: &GeneratedToken) -> Result<Token> {
        let mut token = Token {
            id: 0,
            user_id: generated.user_id,
            token_digest: generated.digest,
            created_at: generated.created_at,
            expiry: generated.expiry,
        };
        token.id = self.storage.insert_token(&token).await?;
        Ok(token)
    }

    pub async fn find(&self, token_id: i64) -> Result<Token> {
        self.storage
            .get_token(token_id)
            .await?
            .ok_or_else(|| RustyKeysError::NotFound(format!("token {}", token_id)))
    }

    pub async fn find_by_digest(&self, digest: &TokenDigest) -> Result<Token> {
        self.storage
            .get_token_by_digest(digest)
            .await?
            .ok_or_else(|| RustyKeysError::NotFound(format!("token {}", digest.short())))
    }

    pub async fn find_by_plaintext(&self, plaintext: &str) -> Result<Token> {
        self.find_by_digest(&TokenDigest::from_plaintext(plaintext))
            .await
    }

    /// Newest first, including expired tokens
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Token>> {
        self.storage.list_user_tokens(user_id).await
    }

    /// Idempotent: an absent token is `Ok(false)`, not an error
    pub async fn delete_by_id(&self, token_id: i64) -> Result<bool> {
        let deleted = self.storage.delete_token(token_id).await?;
        if !deleted {
            log::debug!("Token {} already absent", token_id);
        }
        Ok(deleted)
    }

    /// Idempotent: an absent token is `Ok(false)`, not an error
    pub async fn delete_by_plaintext(&self, plaintext: &str) -> Result<bool> {
        let digest = TokenDigest::from_plaintext(plaintext);
        let deleted = self.storage.delete_token_by_digest(&digest).await?;
        if !deleted {
            log::debug!("Token {} already absent", digest.short());
        }
        Ok(deleted)
    }

    pub async fn delete_for_user(&self, user_id: i64) -> Result<usize> {
        self.storage.delete_user_tokens(user_id).await
    }

    /// Reclaim storage held by tokens that expired at or before `now`
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.storage.delete_expired_tokens(now).await?;
        if purged > 0 {
            log::info!("Purged {} expired tokens", purged);
        }
        Ok(purged)
    }
}
