//! Windowed rate limiting.
//!
//! Rules are registered by name and keyed by `(rule, key_type, key)`.
//! Counters use a fixed window: one tick past the window boundary the
//! counter resets and requests are allowed again.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// What a counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Per client IP.
    Ip,
    /// Per principal.
    User,
    /// One shared counter.
    Global,
}

/// What happens when a rule's window is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExceed {
    /// Hard failure.
    Reject,
    /// Advisory delay; the caller awaits `retry_after` and proceeds.
    Delay,
}

/// A named rate-limit rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRule {
    /// Rule name (`auth_attempts`, …).
    pub name: String,
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// Counter key scope.
    pub key_type: KeyType,
    /// Behavior when exhausted.
    pub on_exceed: OnExceed,
}

impl RateRule {
    /// The default login rule: 5 attempts / 15 minutes / IP, reject.
    #[must_use]
    pub fn auth_attempts() -> Self {
        Self {
            name: "auth_attempts".into(),
            max_requests: 5,
            window: Duration::from_secs(15 * 60),
            key_type: KeyType::Ip,
            on_exceed: OnExceed::Reject,
        }
    }
}

/// Outcome of a rate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Request is within the window.
    Allowed {
        /// Requests left in the current window.
        remaining: u32,
    },
    /// Rule exhausted with `on_exceed = reject`.
    Rejected {
        /// Milliseconds until the window resets.
        retry_after_ms: i64,
    },
    /// Rule exhausted with `on_exceed = delay`.
    Delayed {
        /// Milliseconds the caller should wait before proceeding.
        retry_after_ms: i64,
    },
}

impl RateDecision {
    /// Whether the request may proceed immediately.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Fixed-window counter state.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    window_start_ms: i64,
    count: u32,
}

/// The rate limiter: named rules plus per-key counters.
pub struct RateLimiter {
    rules: RwLock<HashMap<String, RateRule>>,
    counters: DashMap<(String, String), WindowCounter>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter pre-seeded with the `auth_attempts` rule.
    #[must_use]
    pub fn new() -> Self {
        let limiter = Self {
            rules: RwLock::new(HashMap::new()),
            counters: DashMap::new(),
        };
        limiter.upsert_rule(RateRule::auth_attempts());
        limiter
    }

    /// Register or replace a rule.
    pub fn upsert_rule(&self, rule: RateRule) {
        if let Ok(mut rules) = self.rules.write() {
            rules.insert(rule.name.clone(), rule);
        }
    }

    /// Check (and count) a request against a rule.
    ///
    /// Unknown rules allow everything: rate limiting is opt-in per call
    /// site, and a missing rule must not lock the gateway out.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule table lock is poisoned.
    pub fn check(&self, rule_name: &str, key: &str) -> AuthResult<RateDecision> {
        let rule = {
            let rules = self
                .rules
                .read()
                .map_err(|e| AuthError::Storage(e.to_string()))?;
            match rules.get(rule_name) {
                Some(rule) => rule.clone(),
                None => {
                    return Ok(RateDecision::Allowed {
                        remaining: u32::MAX,
                    });
                },
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let window_ms = i64::try_from(rule.window.as_millis()).unwrap_or(i64::MAX);
        let counter_key = (rule.name.clone(), key.to_string());

        let mut entry = self.counters.entry(counter_key).or_insert(WindowCounter {
            window_start_ms: now_ms,
            count: 0,
        });

        // Window expired: reset.
        if now_ms.saturating_sub(entry.window_start_ms) >= window_ms {
            entry.window_start_ms = now_ms;
            entry.count = 0;
        }

        if entry.count >= rule.max_requests {
            let retry_after_ms = entry
                .window_start_ms
                .saturating_add(window_ms)
                .saturating_sub(now_ms)
                .max(0);
            return Ok(match rule.on_exceed {
                OnExceed::Reject => RateDecision::Rejected { retry_after_ms },
                OnExceed::Delay => RateDecision::Delayed { retry_after_ms },
            });
        }

        entry.count = entry.count.saturating_add(1);
        let remaining = rule.max_requests.saturating_sub(entry.count);
        Ok(RateDecision::Allowed { remaining })
    }

    /// Drop counters whose window has fully elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule table lock is poisoned.
    pub fn cleanup(&self) -> AuthResult<()> {
        let rules = self
            .rules
            .read()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let now_ms = Utc::now().timestamp_millis();
        self.counters.retain(|(rule_name, _), counter| {
            rules.get(rule_name).is_some_and(|rule| {
                let window_ms = i64::try_from(rule.window.as_millis()).unwrap_or(i64::MAX);
                now_ms.saturating_sub(counter.window_start_ms) < window_ms
            })
        });
        Ok(())
    }

    /// Number of live counters (test/diagnostic hook).
    #[must_use]
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("counters", &self.counters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_rule(max: u32, window_ms: u64, on_exceed: OnExceed) -> RateRule {
        RateRule {
            name: "test_rule".into(),
            max_requests: max,
            window: Duration::from_millis(window_ms),
            key_type: KeyType::Ip,
            on_exceed,
        }
    }

    #[test]
    fn test_allows_up_to_max() {
        let limiter = RateLimiter::new();
        limiter.upsert_rule(fast_rule(3, 60_000, OnExceed::Reject));

        for _ in 0..3 {
            assert!(limiter.check("test_rule", "1.2.3.4").unwrap().is_allowed());
        }
        assert!(matches!(
            limiter.check("test_rule", "1.2.3.4").unwrap(),
            RateDecision::Rejected { .. }
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        limiter.upsert_rule(fast_rule(1, 60_000, OnExceed::Reject));

        assert!(limiter.check("test_rule", "1.1.1.1").unwrap().is_allowed());
        assert!(limiter.check("test_rule", "2.2.2.2").unwrap().is_allowed());
        assert!(!limiter.check("test_rule", "1.1.1.1").unwrap().is_allowed());
    }

    #[test]
    fn test_window_reset_allows_again() {
        let limiter = RateLimiter::new();
        limiter.upsert_rule(fast_rule(1, 30, OnExceed::Reject));

        assert!(limiter.check("test_rule", "ip").unwrap().is_allowed());
        assert!(!limiter.check("test_rule", "ip").unwrap().is_allowed());

        // One tick past the window boundary.
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("test_rule", "ip").unwrap().is_allowed());
    }

    #[test]
    fn test_delay_mode() {
        let limiter = RateLimiter::new();
        limiter.upsert_rule(fast_rule(1, 60_000, OnExceed::Delay));

        assert!(limiter.check("test_rule", "ip").unwrap().is_allowed());
        match limiter.check("test_rule", "ip").unwrap() {
            RateDecision::Delayed { retry_after_ms } => assert!(retry_after_ms > 0),
            other => panic!("expected Delayed, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_rule_allows() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("no_such_rule", "ip").unwrap().is_allowed());
    }

    #[test]
    fn test_cleanup_drops_expired() {
        let limiter = RateLimiter::new();
        limiter.upsert_rule(fast_rule(5, 20, OnExceed::Reject));
        limiter.check("test_rule", "a").unwrap();
        limiter.check("test_rule", "b").unwrap();
        assert_eq!(limiter.counter_count(), 2);

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup().unwrap();
        assert_eq!(limiter.counter_count(), 0);
    }

    #[test]
    fn test_default_auth_attempts_rule() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("auth_attempts", "9.9.9.9").unwrap().is_allowed());
        }
        assert!(!limiter.check("auth_attempts", "9.9.9.9").unwrap().is_allowed());
    }
}
