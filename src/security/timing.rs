//! Timing attack protection utilities
//!
//! Digest comparisons must not short-circuit on the first differing byte,
//! and authentication responses must not finish faster on one failure path
//! than on another.

use std::time::{Duration, Instant};

use crate::constants::DEFAULT_AUTH_FLOOR_MS;

/// Constant-time byte array comparison
///
/// Only the lengths are compared eagerly; they are public for fixed-size digests.
pub fn constant_time_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.iter().zip(b.iter()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

/// Sleep until `min_duration` has passed since `start_time`
pub async fn add_auth_delay(start_time: Instant, min_duration: Duration) {
    let elapsed = start_time.elapsed();
    if elapsed < min_duration {
        tokio::time::sleep(min_duration - elapsed).await;
    }
}

/// Pads an authentication attempt to a fixed minimum wall time, so that
/// cheap rejections (bad header shape) and expensive ones (storage lookup,
/// password hash) are indistinguishable to a remote observer
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    /// Create a new auth timer with minimum duration
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until minimum duration has elapsed
    pub async fn wait(self) {
        if !self.min_duration.is_zero() {
            add_auth_delay(self.start, self.min_duration).await;
        }
    }
}

impl Default for AuthTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_AUTH_FLOOR_MS))
    }
}
