//! Retry logic.
//!
//! # Responsibilities
//! - Bound attempts per request (original call plus at most one retry)
//! - Delay retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - The caller decides what is retryable; the policy only counts and waits
//! - A rejected request is never retried, only transient unavailability

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Hard ceiling on attempts per request.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let attempts = if config.enabled { config.max_attempts } else { 1 };
        Self::new(attempts, config.base_delay_ms, config.max_delay_ms)
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, 0, 0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempt` (1-based) finished.
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.max_attempts
    }

    /// Pause after the `attempt`-th failure: `base · 2^(attempt-1)`, capped,
    /// plus up to a quarter of that again as jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let Some(exponent) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let nominal = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX))
            .min(self.max_delay_ms);
        let jitter = match nominal / 4 {
            0 => 0,
            spread => rand::thread_rng().gen_range(0..=spread),
        };
        Duration::from_millis(nominal + jitter)
    }

    /// Run `op` until it yields a non-retryable outcome or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut, R>(&self, mut op: F, retryable: R) -> T
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        R: Fn(&T) -> bool,
    {
        let mut attempt = 1;
        loop {
            let outcome = op(attempt).await;
            if !self.should_retry(attempt, retryable(&outcome)) {
                return outcome;
            }
            let delay = self.delay_for(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
