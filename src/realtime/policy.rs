//! Reconnect backoff policy.
//!
//! Retry `n` (1-based) waits `base_delay * 2^(n-1)`. Once `n / max_attempts`
//! exceeds `penalty_threshold`, a fixed `penalty` is added on top. After
//! `max_attempts` failed retries the driver stops for `cooldown`.

use std::time::Duration;

use crate::config::env_parse;

const DEFAULT_BASE_DELAY_MS: u64 = 2000;
const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_PENALTY_MS: u64 = 5000;
const DEFAULT_PENALTY_THRESHOLD: f64 = 0.7;
const DEFAULT_COOLDOWN_MS: u64 = 300_000;

/// Exponent cap so `2^(n-1)` can never overflow the multiplication.
const MAX_EXPONENT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub penalty: Duration,
    /// Fraction of `max_attempts` past which `penalty` applies.
    pub penalty_threshold: f64,
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            penalty: Duration::from_millis(DEFAULT_PENALTY_MS),
            penalty_threshold: DEFAULT_PENALTY_THRESHOLD,
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_delay: Duration::from_millis(env_parse("REALTIME_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS)),
            max_attempts: env_parse("REALTIME_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS).max(1),
            penalty: Duration::from_millis(env_parse("REALTIME_PENALTY_MS", DEFAULT_PENALTY_MS)),
            penalty_threshold: env_parse("REALTIME_PENALTY_THRESHOLD", DEFAULT_PENALTY_THRESHOLD),
            cooldown: Duration::from_millis(env_parse("REALTIME_COOLDOWN_MS", DEFAULT_COOLDOWN_MS)),
        }
    }

    /// Whether `attempt` is far enough along to carry the penalty.
    #[must_use]
    pub fn is_penalized(&self, attempt: u32) -> bool {
        if self.max_attempts == 0 {
            return false;
        }
        f64::from(attempt) / f64::from(self.max_attempts) > self.penalty_threshold
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 is treated as 1.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        if self.is_penalized(attempt) {
            backoff.saturating_add(self.penalty)
        } else {
            backoff
        }
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
