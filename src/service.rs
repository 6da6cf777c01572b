//! Authentication service
//!
//! The three contracts the surrounding application consumes (login, token
//! issuance, bearer authentication) plus the token and account management
//! around them. Every component is injected; nothing here is global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::{
    AuthOutcome, AuthValidator, CredentialStore, Identity, IssuedToken, NewUser, PasswordHasher,
    TokenDigest, TokenGenerator, TokenMetadata, TokenStore, User, UserUpdate,
};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{Result, RustyKeysError};
use crate::metrics::AuthMetrics;
use crate::security::AuthTimer;
use crate::security_logger::{LoginFailure, SecurityEvent, SecurityLogger};
use crate::storage::{StorageProvider, TokenStorage, UserStorage};

/// Successful password login
#[derive(Debug)]
pub struct Login {
    pub identity: Identity,
    /// Present when the caller asked for a token
    pub token: Option<IssuedToken>,
}

pub struct AuthService {
    config: AuthConfig,
    credentials: Arc<CredentialStore>,
    tokens: Arc<TokenStore>,
    generator: TokenGenerator,
    validator: AuthValidator,
    clock: Arc<dyn Clock>,
    security: Arc<SecurityLogger>,
    metrics: Arc<AuthMetrics>,
    // Verified against when the email is unknown, so both paths pay for a hash
    decoy_digest: String,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStorage>,
        tokens: Arc<dyn TokenStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let hasher = PasswordHasher::from_config(&config)?;
        let credentials = Arc::new(CredentialStore::new(users, hasher, clock.clone()));
        let tokens = Arc::new(TokenStore::new(tokens));
        let generator = TokenGenerator::new(config.token_length, clock.clone());
        let validator = AuthValidator::new(
            tokens.clone(),
            credentials.clone(),
            clock.clone(),
            config.token_length,
        );
        let decoy_digest = credentials.hash_decoy("rusty-keys-decoy-password")?;

        Ok(Self {
            config,
            credentials,
            tokens,
            generator,
            validator,
            clock,
            security: Arc::new(SecurityLogger::new()),
            metrics: Arc::new(AuthMetrics::in_memory()),
            decoy_digest,
        })
    }

    /// Build on a single provider serving both users and tokens
    pub fn with_provider<P>(config: AuthConfig, provider: Arc<P>, clock: Arc<dyn Clock>) -> Result<Self>
    where
        P: StorageProvider + 'static,
    {
        let users: Arc<dyn UserStorage> = provider.clone();
        let tokens: Arc<dyn TokenStorage> = provider;
        Self::new(config, users, tokens, clock)
    }

    /// Share a security logger and metrics sink with other components
    pub fn with_observers(mut self, security: Arc<SecurityLogger>, metrics: Arc<AuthMetrics>) -> Self {
        self.security = security;
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn security_logger(&self) -> &SecurityLogger {
        &self.security
    }

    pub fn metrics(&self) -> &AuthMetrics {
        &self.metrics
    }

    pub async fn register(&self, profile: NewUser, password: &str) -> Result<User> {
        self.credentials.create(profile, password).await
    }

    /// Verify an email and password pair, optionally issuing a token for `ttl`
    /// (`Some(Duration::ZERO)` is not allowed; pass `None` for no token).
    ///
    /// Every refusal is `InvalidCredentials`, whatever its cause. Storage
    /// faults and corrupt stored digests propagate as their own errors.
    pub async fn login(&self, email: &str, password: &str, ttl: Option<Duration>) -> Result<Login> {
        let timer = AuthTimer::new(self.config.auth_floor);

        let result = match self.check_password(email, password).await {
            Ok(Ok(user)) => self.complete_login(&user, ttl).await,
            Ok(Err(reason)) => {
                self.metrics.record_login(false).await;
                self.security
                    .log_event(SecurityEvent::LoginFailed { reason })
                    .await;
                Err(RustyKeysError::InvalidCredentials)
            }
            Err(e) => Err(self.storage_failure("login", e).await),
        };

        timer.wait().await;
        result
    }

    async fn check_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<std::result::Result<User, LoginFailure>> {
        let user = match self.credentials.by_email(email).await {
            Ok(user) => user,
            Err(RustyKeysError::NotFound(_)) => {
                self.credentials.verify(&self.decoy_digest, password).await?;
                return Ok(Err(LoginFailure::UnknownEmail));
            }
            Err(e) => return Err(e),
        };

        if !self
            .credentials
            .verify(&user.password_digest, password)
            .await?
        {
            return Ok(Err(LoginFailure::WrongPassword));
        }
        if !user.active {
            return Ok(Err(LoginFailure::Inactive));
        }
        Ok(Ok(user))
    }

    async fn complete_login(&self, user: &User, ttl: Option<Duration>) -> Result<Login> {
        let token = match ttl {
            Some(ttl) => Some(self.issue(user.id, Some(ttl)).await?),
            None => None,
        };

        self.metrics.record_login(true).await;
        self.security
            .log_event(SecurityEvent::LoginSucceeded { user_id: user.id })
            .await;

        Ok(Login {
            identity: Identity::from(user),
            token,
        })
    }

    /// Authenticate a raw `Authorization` header value
    pub async fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthOutcome> {
        let timer = AuthTimer::new(self.config.auth_floor);
        let started = Instant::now();

        let result = match self.validator.authenticate(auth_header).await {
            Ok(outcome) => {
                self.metrics
                    .record_authentication(outcome.rejection(), started.elapsed())
                    .await;
                let event = match &outcome {
                    AuthOutcome::Authenticated(identity) => SecurityEvent::AuthenticationSuccess {
                        user_id: identity.user_id,
                    },
                    AuthOutcome::Rejected(kind) => SecurityEvent::AuthenticationFailed { kind: *kind },
                };
                self.security.log_event(event).await;
                Ok(outcome)
            }
            Err(e) => Err(self.storage_failure("authenticate", e).await),
        };

        timer.wait().await;
        result
    }

    /// Issue a token for `user_id`; `None` uses the configured default TTL.
    /// The returned plaintext is not retrievable again.
    pub async fn issue(&self, user_id: i64, ttl: Option<Duration>) -> Result<IssuedToken> {
        let generated = self
            .generator
            .generate(user_id, ttl.unwrap_or(self.config.default_ttl))?;
        let token = self.tokens.insert(&generated).await?;

        self.metrics.record_token_issued().await;
        self.security
            .log_event(SecurityEvent::TokenIssued {
                user_id,
                token_id: token.id,
            })
            .await;

        Ok(IssuedToken {
            plaintext: generated.plaintext,
            token,
        })
    }

    /// True iff `plaintext` is a live token of an existing user
    pub async fn validate_token(&self, plaintext: &str) -> Result<bool> {
        Ok(self
            .validator
            .validate_plaintext(plaintext)
            .await?
            .is_authenticated())
    }

    /// The owner of a live token
    pub async fn user_for_token(&self, plaintext: &str) -> Result<Option<User>> {
        Ok(self.validator.resolve(plaintext).await?.ok().map(|(_, user)| user))
    }

    /// Revoke one token by id. Returns whether a token was removed; revoking
    /// an absent token succeeds and records nothing.
    pub async fn revoke_by_id(&self, token_id: i64) -> Result<bool> {
        let revoked = self.tokens.delete_by_id(token_id).await?;
        if revoked {
            self.record_revocation(format!("id {}", token_id)).await;
        }
        Ok(revoked)
    }

    /// Revoke one token by its plaintext, with the same contract as `revoke_by_id`
    pub async fn revoke_token(&self, plaintext: &str) -> Result<bool> {
        let revoked = self.tokens.delete_by_plaintext(plaintext).await?;
        if revoked {
            let digest = TokenDigest::from_plaintext(plaintext);
            self.record_revocation(format!("digest {}", digest.short()))
                .await;
        }
        Ok(revoked)
    }

    async fn record_revocation(&self, reference: String) {
        self.metrics.record_tokens_revoked(1).await;
        self.security
            .log_event(SecurityEvent::TokenRevoked { reference })
            .await;
    }

    pub async fn revoke_all(&self, user_id: i64) -> Result<usize> {
        let count = self.tokens.delete_for_user(user_id).await?;
        self.metrics.record_tokens_revoked(count).await;
        self.security
            .log_event(SecurityEvent::AllTokensRevoked { user_id, count })
            .await;
        Ok(count)
    }

    /// Metadata of every token of `user_id`, newest first, expired ones included
    pub async fn list_tokens(&self, user_id: i64) -> Result<Vec<TokenMetadata>> {
        let tokens = self.tokens.list_for_user(user_id).await?;
        Ok(tokens.iter().map(|t| t.metadata()).collect())
    }

    /// Update a profile. Deactivating an account revokes all of its tokens,
    /// matching `login`, which refuses inactive accounts.
    pub async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<User> {
        let deactivating = update.active == Some(false);
        let user = self.credentials.update(user_id, update).await?;
        if deactivating {
            self.revoke_all(user_id).await?;
        }
        Ok(user)
    }

    /// Change a password and revoke every token issued under the old one
    pub async fn reset_password(&self, user_id: i64, new_password: &str) -> Result<()> {
        self.credentials.reset_password(user_id, new_password).await?;
        self.security
            .log_event(SecurityEvent::PasswordReset { user_id })
            .await;
        self.revoke_all(user_id).await?;
        Ok(())
    }

    /// Delete a user along with its tokens; absent users are not an error
    pub async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let deleted = self.credentials.delete(user_id).await?;
        if deleted {
            self.security
                .log_event(SecurityEvent::UserDeleted { user_id })
                .await;
        }
        Ok(deleted)
    }

    /// Remove tokens that are already past their expiry
    pub async fn purge_expired(&self) -> Result<usize> {
        let count = self.tokens.purge_expired(self.clock.now()).await?;
        if count > 0 {
            self.security
                .log_event(SecurityEvent::TokensPurged { count })
                .await;
        }
        Ok(count)
    }

    async fn storage_failure(&self, operation: &'static str, err: RustyKeysError) -> RustyKeysError {
        if err.is_storage() {
            self.metrics.record_storage_error(operation).await;
            self.security
                .log_event(SecurityEvent::StorageFailure {
                    operation,
                    error: err.to_string(),
                })
                .await;
        }
        err
    }
}
