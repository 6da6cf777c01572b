//! Bearer token authentication
//!
//! `authenticate` walks a presented `Authorization` value through a fixed
//! sequence of checks. Each check either passes the request on or ends it
//! with a `RejectionKind`:
//!
//! 1. header shape (`Bearer <token>`) -> `MissingHeader`
//! 2. token length -> `Malformed`
//! 3. digest lookup -> `InvalidToken`
//! 4. expiry -> `Expired`
//! 5. owner lookup -> `OrphanedToken`
//!
//! The kinds are for logs and metrics only. Callers facing the network
//! should hand out `AuthOutcome::public()`, which erases them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::auth::credentials::CredentialStore;
use crate::auth::token::{extract_bearer_token, Token};
use crate::auth::tokens::TokenStore;
use crate::auth::user::{Identity, User};
use crate::clock::Clock;
use crate::error::{Result, RustyKeysError};

/// Why an authentication attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    MissingHeader,
    Malformed,
    InvalidToken,
    Expired,
    OrphanedToken,
}

impl RejectionKind {
    pub const ALL: [RejectionKind; 5] = [
        RejectionKind::MissingHeader,
        RejectionKind::Malformed,
        RejectionKind::InvalidToken,
        RejectionKind::Expired,
        RejectionKind::OrphanedToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::MissingHeader => "missing_header",
            RejectionKind::Malformed => "malformed",
            RejectionKind::InvalidToken => "invalid_token",
            RejectionKind::Expired => "expired",
            RejectionKind::OrphanedToken => "orphaned_token",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal result of an authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Rejected(RejectionKind),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Authenticated(identity) => Some(identity),
            AuthOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<RejectionKind> {
        match self {
            AuthOutcome::Authenticated(_) => None,
            AuthOutcome::Rejected(kind) => Some(*kind),
        }
    }

    /// The outcome with every rejection collapsed into one value
    pub fn public(&self) -> PublicOutcome {
        match self {
            AuthOutcome::Authenticated(identity) => PublicOutcome::Authenticated(identity.clone()),
            AuthOutcome::Rejected(_) => PublicOutcome::Unauthenticated,
        }
    }
}

/// What may be shown to the presenter of a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublicOutcome {
    Authenticated(Identity),
    Unauthenticated,
}

/// Resolves bearer credentials to identities
pub struct AuthValidator {
    tokens: Arc<TokenStore>,
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    token_length: usize,
}

impl AuthValidator {
    pub fn new(
        tokens: Arc<TokenStore>,
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        token_length: usize,
    ) -> Self {
        Self {
            tokens,
            credentials,
            clock,
            token_length,
        }
    }

    /// Authenticate a raw `Authorization` header value.
    ///
    /// `Err` is reserved for storage faults; every refusal is `Ok(Rejected(_))`.
    pub async fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthOutcome> {
        let presented = match auth_header.and_then(extract_bearer_token) {
            Some(token) => token,
            None => return Ok(AuthOutcome::Rejected(RejectionKind::MissingHeader)),
        };
        self.validate_plaintext(presented).await
    }

    /// Steps 2 to 5 for a token that has already been taken out of its header
    pub async fn validate_plaintext(&self, presented: &str) -> Result<AuthOutcome> {
        Ok(match self.resolve(presented).await? {
            Ok((_, user)) => AuthOutcome::Authenticated(Identity::from(&user)),
            Err(kind) => AuthOutcome::Rejected(kind),
        })
    }

    /// The live token and its owner, or the reason there is none
    pub(crate) async fn resolve(
        &self,
        presented: &str,
    ) -> Result<std::result::Result<(Token, User), RejectionKind>> {
        // Length is public (fixed by configuration), so checking it first leaks nothing
        if presented.len() != self.token_length {
            return Ok(Err(RejectionKind::Malformed));
        }

        let token = match self.tokens.find_by_plaintext(presented).await {
            Ok(token) => token,
            Err(RustyKeysError::NotFound(_)) => return Ok(Err(RejectionKind::InvalidToken)),
            Err(e) => return Err(e),
        };

        if token.is_expired_at(self.clock.now()) {
            return Ok(Err(RejectionKind::Expired));
        }

        match self.credentials.find(token.user_id).await {
            Ok(user) => Ok(Ok((token, user))),
            Err(RustyKeysError::NotFound(_)) => Ok(Err(RejectionKind::OrphanedToken)),
            Err(e) => Err(e),
        }
    }
}
