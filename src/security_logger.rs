//! Security-focused logging of authentication events
//!
//! Every event goes to the `log` facade with a `SECURITY:` prefix and into a
//! bounded in-memory buffer. Repeated events of the same type raise an alert
//! once a per-type threshold is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::auth::validator::RejectionKind;

const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Why a login attempt was refused. Never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    UnknownEmail,
    WrongPassword,
    Inactive,
}

impl LoginFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::UnknownEmail => "unknown_email",
            LoginFailure::WrongPassword => "wrong_password",
            LoginFailure::Inactive => "inactive",
        }
    }
}

/// Types of security events to track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    // Bearer authentication
    AuthenticationSuccess { user_id: i64 },
    AuthenticationFailed { kind: RejectionKind },

    // Password login
    LoginSucceeded { user_id: i64 },
    LoginFailed { reason: LoginFailure },

    // Token lifecycle
    TokenIssued { user_id: i64, token_id: i64 },
    TokenRevoked { reference: String },
    AllTokensRevoked { user_id: i64, count: usize },
    TokensPurged { count: usize },

    // Account changes
    PasswordReset { user_id: i64 },
    UserDeleted { user_id: i64 },

    // Backend
    StorageFailure { operation: &'static str, error: String },
}

impl SecurityEvent {
    /// Key used for counters and alert thresholds
    pub fn key(&self) -> &'static str {
        match self {
            SecurityEvent::AuthenticationSuccess { .. } => "auth_success",
            SecurityEvent::AuthenticationFailed { .. } => "auth_failed",
            SecurityEvent::LoginSucceeded { .. } => "login_success",
            SecurityEvent::LoginFailed { .. } => "login_failed",
            SecurityEvent::TokenIssued { .. } => "token_issued",
            SecurityEvent::TokenRevoked { .. } => "token_revoked",
            SecurityEvent::AllTokensRevoked { .. } => "all_tokens_revoked",
            SecurityEvent::TokensPurged { .. } => "tokens_purged",
            SecurityEvent::PasswordReset { .. } => "password_reset",
            SecurityEvent::UserDeleted { .. } => "user_deleted",
            SecurityEvent::StorageFailure { .. } => "storage_failure",
        }
    }
}

#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: RwLock<VecDeque<TimestampedEvent>>,
    event_counts: RwLock<HashMap<&'static str, usize>>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
    alerts_raised: AtomicUsize,
}

impl SecurityLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Keep at most `max_events` events in the buffer
    pub fn with_capacity(max_events: usize) -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("auth_failed", 10);
        alert_thresholds.insert("login_failed", 5);
        alert_thresholds.insert("storage_failure", 1);

        Self {
            events: RwLock::new(VecDeque::new()),
            event_counts: RwLock::new(HashMap::new()),
            max_events,
            alert_thresholds,
            alerts_raised: AtomicUsize::new(0),
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let key = event.key();

        match &event {
            SecurityEvent::AuthenticationSuccess { user_id } => {
                log::debug!("SECURITY: Authentication success - User: {}", user_id);
            }
            SecurityEvent::AuthenticationFailed { kind } => {
                log::warn!("SECURITY: Authentication failed - Reason: {}", kind);
            }
            SecurityEvent::LoginSucceeded { user_id } => {
                log::info!("SECURITY: Login success - User: {}", user_id);
            }
            SecurityEvent::LoginFailed { reason } => {
                log::warn!("SECURITY: Login failed - Reason: {}", reason.as_str());
            }
            SecurityEvent::TokenIssued { user_id, token_id } => {
                log::info!("SECURITY: Token issued - User: {}, Token: {}", user_id, token_id);
            }
            SecurityEvent::TokenRevoked { reference } => {
                log::info!("SECURITY: Token revoked - Token: {}", reference);
            }
            SecurityEvent::AllTokensRevoked { user_id, count } => {
                log::warn!("SECURITY: All tokens revoked - User: {}, Count: {}", user_id, count);
            }
            SecurityEvent::TokensPurged { count } => {
                log::info!("SECURITY: Expired tokens purged - Count: {}", count);
            }
            SecurityEvent::PasswordReset { user_id } => {
                log::warn!("SECURITY: Password reset - User: {}", user_id);
            }
            SecurityEvent::UserDeleted { user_id } => {
                log::warn!("SECURITY: User deleted - User: {}", user_id);
            }
            SecurityEvent::StorageFailure { operation, error } => {
                log::error!("SECURITY: Storage failure - Operation: {}, Error: {}", operation, error);
            }
        }

        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(key).or_insert(0);
            *count += 1;

            if let Some(&threshold) = self.alert_thresholds.get(key) {
                if *count % threshold == 0 {
                    self.trigger_alert(key, *count, &event);
                }
            }
        }

        let mut events = self.events.write().await;
        events.push_back(TimestampedEvent {
            event,
            timestamp: Instant::now(),
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    fn trigger_alert(&self, event_type: &str, count: usize, sample_event: &SecurityEvent) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        log::error!("SECURITY ALERT: {} events of type '{}' detected", count, event_type);
        log::error!("Sample event: {:?}", sample_event);
    }

    /// Events logged within the last `window`
    pub async fn get_recent_events(&self, window: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        events
            .iter()
            .filter(|e| e.timestamp.elapsed() <= window)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Running totals per event type
    pub async fn get_event_stats(&self) -> HashMap<&'static str, usize> {
        self.event_counts.read().await.clone()
    }

    pub fn alerts_raised(&self) -> usize {
        self.alerts_raised.load(Ordering::Relaxed)
    }

    /// Drop buffered events older than `max_age`
    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        events.retain(|e| e.timestamp.elapsed() <= max_age);
    }

    /// Periodically drop buffered events older than `max_age`
    pub fn spawn_cleanup_task(self: Arc<Self>, every: Duration, max_age: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                self.cleanup_old_events(max_age).await;
            }
        })
    }
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_counted_by_type() {
        let logger = SecurityLogger::new();
        logger
            .log_event(SecurityEvent::AuthenticationFailed {
                kind: RejectionKind::Expired,
            })
            .await;
        logger
            .log_event(SecurityEvent::AuthenticationFailed {
                kind: RejectionKind::Malformed,
            })
            .await;
        logger
            .log_event(SecurityEvent::LoginSucceeded { user_id: 1 })
            .await;

        let stats = logger.get_event_stats().await;
        assert_eq!(stats.get("auth_failed"), Some(&2));
        assert_eq!(stats.get("login_success"), Some(&1));
        assert_eq!(logger.get_recent_events(Duration::from_secs(60)).await.len(), 3);
    }

    #[tokio::test]
    async fn test_buffer_is_bounded() {
        let logger = SecurityLogger::with_capacity(3);
        for user_id in 0..5 {
            logger
                .log_event(SecurityEvent::AuthenticationSuccess { user_id })
                .await;
        }

        let events = logger.get_recent_events(Duration::from_secs(60)).await;
        assert_eq!(
            events,
            vec![
                SecurityEvent::AuthenticationSuccess { user_id: 2 },
                SecurityEvent::AuthenticationSuccess { user_id: 3 },
                SecurityEvent::AuthenticationSuccess { user_id: 4 },
            ]
        );
        // Totals are not affected by the buffer bound
        assert_eq!(logger.get_event_stats().await.get("auth_success"), Some(&5));
    }

    #[tokio::test]
    async fn test_alert_threshold() {
        let logger = SecurityLogger::new();
        for _ in 0..4 {
            logger
                .log_event(SecurityEvent::LoginFailed {
                    reason: LoginFailure::WrongPassword,
                })
                .await;
        }
        assert_eq!(logger.alerts_raised(), 0);

        logger
            .log_event(SecurityEvent::LoginFailed {
                reason: LoginFailure::UnknownEmail,
            })
            .await;
        assert_eq!(logger.alerts_raised(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_everything_with_zero_age() {
        let logger = SecurityLogger::new();
        logger.log_event(SecurityEvent::TokensPurged { count: 2 }).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        logger.cleanup_old_events(Duration::ZERO).await;
        assert!(logger.get_recent_events(Duration::from_secs(60)).await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_task_prunes_periodically() {
        let logger = Arc::new(SecurityLogger::new());
        logger.log_event(SecurityEvent::UserDeleted { user_id: 1 }).await;

        let handle = logger
            .clone()
            .spawn_cleanup_task(Duration::from_millis(10), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(logger.get_recent_events(Duration::from_secs(60)).await.is_empty());
        // Counters survive pruning
        assert_eq!(logger.get_event_stats().await.get("user_deleted"), Some(&1));
    }
}
