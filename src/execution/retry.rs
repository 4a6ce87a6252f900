//! Retry Policy
//!
//! Computes the delay sequence between retry attempts. The engine adds no
//! jitter: a step configured with `delay: 100, backoff: exponential` sleeps
//! exactly 100ms, 200ms, 400ms... between attempts, which keeps retry timing
//! deterministic and testable. The retry loop itself lives in the step
//! interpreter.

use std::time::Duration;

use crate::workflow::{Backoff, RetryConfig};

/// Delay calculator for one step's retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from a step's retry configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempts the step body may make, including the first.
    pub fn attempts(&self) -> u32 {
        self.config.attempts
    }

    /// Delay to sleep before the given retry.
    ///
    /// `retry_index` counts retries from 1 (the sleep before attempt 2).
    /// Linear backoff returns the base delay every time; exponential doubles
    /// it per retry: `delay * 2^(retry_index - 1)`.
    pub fn delay_before(&self, retry_index: u32) -> Duration {
        debug_assert!(retry_index >= 1);
        let millis = match self.config.backoff {
            Backoff::Linear => self.config.delay,
            Backoff::Exponential => self
                .config
                .delay
                .saturating_mul(1u64.checked_shl(retry_index - 1).unwrap_or(u64::MAX)),
        };
        Duration::from_millis(millis)
    }

    /// The full delay sequence before attempts `2..=attempts`.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.config.attempts)
            .map(|retry_index| self.delay_before(retry_index))
            .collect()
    }
}
