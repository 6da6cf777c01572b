//! Password hashing with Argon2id
//!
//! Digests are stored in PHC string format
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so every digest carries
//! its own salt and cost parameters and stays verifiable after the
//! configured cost changes.

use argon2::password_hash::{self, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};
use rand::rngs::OsRng;

use crate::config::AuthConfig;
use crate::error::{Result, RustyKeysError};

/// Slow, salted, adaptive password hashing
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Build a hasher for the given time cost and memory cost (KiB)
    pub fn new(cost: u32, memory_kib: u32) -> Result<Self> {
        let params = Params::new(memory_kib, cost, Params::DEFAULT_P_COST, None)
            .map_err(|e| RustyKeysError::ConfigError(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.password_hash_cost, config.password_hash_memory_kib)
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| RustyKeysError::HashingError(e.to_string()))
    }

    /// Check a candidate password against a stored digest
    ///
    /// The salt and cost come from the digest itself. The final comparison
    /// of hash outputs is constant-time. A mismatch is `Ok(false)`; only a
    /// digest that cannot be parsed is an error.
    pub fn verify(&self, stored_digest: &str, candidate: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored_digest)
            .map_err(|e| RustyKeysError::InvalidDigest(e.to_string()))?;

        match self.argon2.verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(RustyKeysError::InvalidDigest(e.to_string())),
        }
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}
