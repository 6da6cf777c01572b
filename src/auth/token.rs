//! Opaque bearer token generation and digests
//!
//! A token plaintext is drawn from the OS CSPRNG and shown to the caller
//! exactly once. Only its SHA-256 digest is persisted.

use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::constants::{BEARER_SCHEME, TOKEN_ALPHABET};
use crate::error::{Result, RustyKeysError};
use crate::security::constant_time_eq_bytes;

/// SHA-256 digest of a token plaintext
#[derive(Clone, Copy, Eq)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    pub fn from_plaintext(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }

    /// Rebuild from raw stored bytes; `None` unless exactly 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Short prefix for log lines
    pub fn short(&self) -> String {
        let mut encoded = self.to_base64();
        encoded.truncate(8);
        encoded
    }
}

impl PartialEq for TokenDigest {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq_bytes(&self.0, &other.0)
    }
}

impl Hash for TokenDigest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({}..)", self.short())
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for TokenDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

/// Persisted token record; never carries the plaintext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: i64,
    pub user_id: i64,
    pub token_digest: TokenDigest,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// A token stops being valid at the instant of its expiry
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            id: self.id,
            user_id: self.user_id,
            token_digest: self.token_digest.to_base64(),
            created_at: self.created_at,
            expiry: self.expiry,
        }
    }
}

/// What listing endpoints may show about a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub id: i64,
    pub user_id: i64,
    /// URL-safe base64 of the SHA-256 digest
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

/// Freshly generated token, not yet persisted
pub struct GeneratedToken {
    pub plaintext: String,
    pub digest: TokenDigest,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for GeneratedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedToken")
            .field("plaintext", &"<redacted>")
            .field("digest", &self.digest)
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// A persisted token together with its one-time plaintext
pub struct IssuedToken {
    pub plaintext: String,
    pub token: Token,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}

/// Produces random fixed-length tokens
#[derive(Clone)]
pub struct TokenGenerator {
    length: usize,
    clock: Arc<dyn Clock>,
}

impl TokenGenerator {
    pub fn new(length: usize, clock: Arc<dyn Clock>) -> Self {
        Self { length, clock }
    }

    pub fn token_length(&self) -> usize {
        self.length
    }

    /// Generate a token for `user_id` valid for `ttl` from now
    pub fn generate(&self, user_id: i64, ttl: Duration) -> Result<GeneratedToken> {
        if ttl.is_zero() {
            return Err(RustyKeysError::ValidationError(
                "token TTL must be greater than zero".to_string(),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| {
            RustyKeysError::ValidationError("token TTL is out of range".to_string())
        })?;

        let created_at = self.clock.now();
        let expiry = created_at.checked_add_signed(ttl).ok_or_else(|| {
            RustyKeysError::ValidationError("token TTL is out of range".to_string())
        })?;

        let plaintext = random_plaintext(self.length);
        let digest = TokenDigest::from_plaintext(&plaintext);

        Ok(GeneratedToken {
            plaintext,
            digest,
            user_id,
            created_at,
            expiry,
        })
    }
}

/// `length` characters drawn uniformly from the token alphabet via OsRng
fn random_plaintext(length: usize) -> String {
    // OsRng is stateless and safe to use from any thread
    let mut rng = OsRng;
    (0..length)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Extracts the token from an `Authorization: Bearer <token>` value
///
/// The scheme is matched case-insensitively; exactly one non-empty
/// credential must follow it.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let mut parts = auth_header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) || parts.next().is_some() {
        return None;
    }
    Some(token)
}
