//! Retry configuration with exponential backoff and jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff configuration for transient provider failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts (0 = only the initial attempt).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the exponential growth.
    pub max_delay: Duration,
    /// Backoff base (typically 2.0).
    pub exponential_base: f64,
    /// Jitter factor in `[0, 1]`.
    #[serde(default)]
    pub jitter_factor: f64,
}

impl RetryConfig {
    /// Provider-call defaults: 3 attempts, 1s initial, 30s cap, 20% jitter.
    #[must_use]
    pub fn api() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// No retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Whether another attempt is allowed after `current_attempt` failures.
    #[must_use]
    pub fn should_retry(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }

    /// Delay for a given attempt (0-indexed; attempt 0 is immediate).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms.max(0.0) as u64)
    }

    /// Delay with jitter applied: `delay × (1 ± jitter_factor)` driven by
    /// `random_factor ∈ [0, 1]`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_with_jitter(&self, attempt: u32, random_factor: f64) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let random_factor = random_factor.clamp(0.0, 1.0);
        let multiplier = 1.0 - self.jitter_factor + (2.0 * self.jitter_factor * random_factor);
        Duration::from_millis((base.as_millis() as f64 * multiplier).max(0.0) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::api()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_caps() {
        let config = RetryConfig {
            max_attempts: 20,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            exponential_base: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig {
            jitter_factor: 0.2,
            ..RetryConfig::api()
        };
        let base = config.delay_for_attempt(2);
        let low = config.delay_with_jitter(2, 0.0);
        let high = config.delay_with_jitter(2, 1.0);
        assert!(low <= base);
        assert!(high >= base);
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::api();
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
        assert!(!RetryConfig::no_retry().should_retry(0));
    }
}
