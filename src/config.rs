//! Authentication configuration module
//! Handles the tunable parameters for password hashing and token issuance

use crate::constants::{
    DEFAULT_AUTH_FLOOR_MS, DEFAULT_PASSWORD_HASH_COST, DEFAULT_PASSWORD_HASH_MEMORY_KIB,
    DEFAULT_TOKEN_LENGTH, DEFAULT_TOKEN_TTL_SECS, MAX_PASSWORD_HASH_COST, MAX_TOKEN_LENGTH,
    MIN_TOKEN_LENGTH,
};
use crate::error::{Result, RustyKeysError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Authentication configuration parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Argon2id time cost (number of passes over memory)
    pub password_hash_cost: u32,
    /// Argon2id memory cost in KiB
    pub password_hash_memory_kib: u32,
    /// Fixed length of every issued token plaintext
    pub token_length: usize,
    /// Lifetime of a token when the caller does not pick one
    pub default_ttl: Duration,
    /// Minimum wall time of an authentication or login response
    pub auth_floor: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: DEFAULT_PASSWORD_HASH_COST,
            password_hash_memory_kib: DEFAULT_PASSWORD_HASH_MEMORY_KIB,
            token_length: DEFAULT_TOKEN_LENGTH,
            default_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            auth_floor: Duration::from_millis(DEFAULT_AUTH_FLOOR_MS),
        }
    }
}

impl AuthConfig {
    /// Cheap hashing and no response padding - only for tests!
    pub fn for_testing() -> Self {
        Self {
            password_hash_cost: 1,
            password_hash_memory_kib: 1024,
            auth_floor: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Check the parameters against the minimums required for safe operation
    pub fn validate(&self) -> Result<()> {
        if self.password_hash_cost == 0 || self.password_hash_cost > MAX_PASSWORD_HASH_COST {
            return Err(RustyKeysError::ConfigError(format!(
                "password hash cost must be between 1 and {}, got {}",
                MAX_PASSWORD_HASH_COST, self.password_hash_cost
            )));
        }

        // Argon2 needs at least 8 KiB per lane
        if self.password_hash_memory_kib < 8 {
            return Err(RustyKeysError::ConfigError(format!(
                "password hash memory must be at least 8 KiB, got {}",
                self.password_hash_memory_kib
            )));
        }

        if self.token_length < MIN_TOKEN_LENGTH || self.token_length > MAX_TOKEN_LENGTH {
            return Err(RustyKeysError::ConfigError(format!(
                "token length must be between {} and {}, got {}",
                MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH, self.token_length
            )));
        }

        if self.default_ttl.is_zero() {
            return Err(RustyKeysError::ConfigError(
                "default token TTL must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load a `.env` file when present, then read the environment
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("Environment variables loaded from {}", path.display()),
            Err(e) => log::debug!("No .env file loaded: {}", e),
        }
        Self::from_env()
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let password_hash_cost = parse_var(&lookup, "RUSTY_KEYS_PASSWORD_HASH_COST")?
            .unwrap_or(defaults.password_hash_cost);

        let password_hash_memory_kib = parse_var(&lookup, "RUSTY_KEYS_PASSWORD_HASH_MEMORY_KIB")?
            .unwrap_or(defaults.password_hash_memory_kib);

        let token_length =
            parse_var(&lookup, "RUSTY_KEYS_TOKEN_LENGTH")?.unwrap_or(defaults.token_length);

        let default_ttl = parse_var::<u64, _>(&lookup, "RUSTY_KEYS_DEFAULT_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_ttl);

        let auth_floor = parse_var::<u64, _>(&lookup, "RUSTY_KEYS_AUTH_FLOOR_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.auth_floor);

        let config = Self {
            password_hash_cost,
            password_hash_memory_kib,
            token_length,
            default_ttl,
            auth_floor,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            RustyKeysError::ConfigError(format!("{} has an invalid value: {:?}", key, raw))
        }),
    }
}
