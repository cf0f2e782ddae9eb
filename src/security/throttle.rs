//! Failed-attempt throttling for authentication.
//!
//! Each client key accumulates failures inside a sliding window. Reaching the
//! limit locks the key; locked keys are refused before any credential check.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::AuthConfig;
use crate::observability::metrics;

/// Identifies who is failing: the peer IP when known, else the presented username.
pub type ClientKey = String;

#[derive(Debug)]
struct AttemptState {
    failures: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl AttemptState {
    fn new(now: Instant) -> Self {
        Self {
            failures: 0,
            window_start: now,
            locked_until: None,
        }
    }
}

/// Tracks failed authentication attempts per client.
#[derive(Debug)]
pub struct AttemptThrottle {
    attempts: DashMap<ClientKey, AttemptState>,
    max_failures: u32,
    window: Duration,
    lockout: Duration,
}

impl AttemptThrottle {
    pub fn new(max_failures: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            max_failures,
            window,
            lockout,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.max_failed_attempts,
            Duration::from_secs(config.failure_window_secs),
            Duration::from_secs(config.lockout_secs),
        )
    }

    /// Remaining lockout for a key, if it is currently locked.
    pub fn check(&self, key: &str) -> Option<Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Option<Duration> {
        let entry = self.attempts.get(key)?;
        entry
            .locked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Record a failure. Returns the lockout duration if this failure triggered one.
    pub fn record_failure(&self, key: &str) -> Option<Duration> {
        self.record_failure_at(key, Instant::now())
    }

    fn record_failure_at(&self, key: &str, now: Instant) -> Option<Duration> {
        metrics::record_auth_failure();
        let mut state = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptState::new(now));

        // Expired lock or stale window: start over.
        let lock_expired = state.locked_until.is_some_and(|until| until <= now);
        if lock_expired || now.duration_since(state.window_start) > self.window {
            *state = AttemptState::new(now);
        }

        state.failures += 1;
        if state.failures >= self.max_failures {
            state.locked_until = Some(now + self.lockout);
            tracing::warn!(
                client = %key,
                failures = state.failures,
                lockout_secs = self.lockout.as_secs(),
                "Authentication locked out"
            );
            return Some(self.lockout);
        }
        None
    }

    /// Clear the failure history after a successful authentication.
    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Drop entries that are neither locked nor inside their window.
    pub fn purge_stale(&self) {
        let now = Instant::now();
        self.attempts.retain(|_, state| match state.locked_until {
            Some(until) => until > now,
            None => now.duration_since(state.window_start) <= self.window,
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> AttemptThrottle {
        AttemptThrottle::new(3, Duration::from_secs(60), Duration::from_secs(300))
    }

    #[test]
    fn test_locks_after_max_failures() {
        let t = throttle();
        let now = Instant::now();
        assert_eq!(t.record_failure_at("10.0.0.1", now), None);
        assert_eq!(t.record_failure_at("10.0.0.1", now), None);
        assert!(t.check_at("10.0.0.1", now).is_none());
        assert_eq!(
            t.record_failure_at("10.0.0.1", now),
            Some(Duration::from_secs(300))
        );
        assert!(t.check_at("10.0.0.1", now + Duration::from_secs(1)).is_some());
        // Other clients are unaffected.
        assert!(t.check_at("10.0.0.2", now).is_none());
    }

    #[test]
    fn test_lock_expires() {
        let t = throttle();
        let now = Instant::now();
        for _ in 0..3 {
            t.record_failure_at("k", now);
        }
        let later = now + Duration::from_secs(301);
        assert!(t.check_at("k", later).is_none());
        // A fresh failure after expiry starts a new count.
        assert_eq!(t.record_failure_at("k", later), None);
    }

    #[test]
    fn test_window_resets_counter() {
        let t = throttle();
        let now = Instant::now();
        t.record_failure_at("k", now);
        t.record_failure_at("k", now);
        let later = now + Duration::from_secs(61);
        assert_eq!(t.record_failure_at("k", later), None);
        assert!(t.check_at("k", later).is_none());
    }

    #[test]
    fn test_success_clears_history() {
        let t = throttle();
        t.record_failure("k");
        t.record_failure("k");
        t.record_success("k");
        assert_eq!(t.record_failure("k"), None);
        assert_eq!(t.tracked_clients(), 1);
    }
}
