//! Rusty Keys - capability-token authentication
//!
//! Opaque bearer tokens, stored only as SHA-256 digests, issued after an
//! Argon2id password login and checked on every request by an
//! `AuthValidator`. Storage is pluggable: an in-memory backend ships
//! always, an SQLite one behind the default `sqlite` feature.

pub mod auth;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod security;
pub mod security_logger;
pub mod service;
pub mod storage;

// Re-export main components
pub use auth::{
    AuthOutcome, AuthValidator, CredentialStore, Identity, IssuedToken, NewUser, PublicOutcome,
    RejectionKind, TokenGenerator, TokenStore, User, UserUpdate,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{Result, RustyKeysError};
pub use service::{AuthService, Login};
