//! Usage tracking and daily budget enforcement.

use std::collections::HashMap;
use std::sync::RwLock;

use secureyeoman_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;

/// One recorded provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Token usage.
    pub usage: TokenUsage,
    /// Cost in USD.
    pub cost_usd: f64,
    /// Call latency, if measured.
    #[serde(default)]
    pub latency_ms: Option<u64>,
    /// When the call completed.
    pub timestamp: Timestamp,
}

/// Aggregated usage over a window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Tokens used since local midnight.
    pub tokens_used_today: u64,
    /// Cost since local midnight.
    pub cost_usd_today: f64,
    /// Cost since the start of the local month.
    pub cost_usd_month: f64,
    /// Total cost ever recorded.
    pub cost_usd_total: f64,
    /// Total calls.
    pub call_count: u64,
    /// Total errored calls.
    pub error_count: u64,
    /// Per-provider token totals.
    pub tokens_by_provider: HashMap<String, u64>,
    /// Per-model token totals.
    pub tokens_by_model: HashMap<String, u64>,
}

/// Result of a budget check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCheck {
    /// Whether further calls are allowed.
    pub allowed: bool,
    /// Tokens used since local midnight.
    pub tokens_used_today: u64,
    /// Configured daily ceiling, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_per_day: Option<u64>,
}

/// In-memory usage tracker.
pub struct UsageTracker {
    records: RwLock<Vec<UsageRecord>>,
    error_count: RwLock<u64>,
    daily_token_limit: RwLock<Option<u64>>,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl UsageTracker {
    /// Create a tracker with an optional daily token ceiling.
    #[must_use]
    pub fn new(daily_token_limit: Option<u64>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            error_count: RwLock::new(0),
            daily_token_limit: RwLock::new(daily_token_limit),
        }
    }

    /// Change the daily ceiling at runtime.
    pub fn set_daily_limit(&self, limit: Option<u64>) {
        if let Ok(mut guard) = self.daily_token_limit.write() {
            *guard = limit;
        }
    }

    /// Record a successful call.
    pub fn record(&self, record: UsageRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }

    /// Record an errored call.
    pub fn record_error(&self) {
        if let Ok(mut count) = self.error_count.write() {
            *count = count.saturating_add(1);
        }
    }

    /// Check the daily budget.
    #[must_use]
    pub fn check_limit(&self) -> LimitCheck {
        let tokens_used_today = self.tokens_since(Timestamp::start_of_today());
        let limit_per_day = self.daily_token_limit.read().ok().and_then(|g| *g);
        let allowed = limit_per_day.is_none_or(|limit| tokens_used_today < limit);
        LimitCheck {
            allowed,
            tokens_used_today,
            limit_per_day,
        }
    }

    fn tokens_since(&self, since: Timestamp) -> u64 {
        self.records.read().map_or(0, |records| {
            records
                .iter()
                .filter(|r| r.timestamp >= since)
                .map(|r| r.usage.total())
                .sum()
        })
    }

    /// Aggregate usage across today / month / total windows.
    #[must_use]
    pub fn summary(&self) -> UsageSummary {
        let today = Timestamp::start_of_today();
        let month = Timestamp::start_of_month();
        let mut summary = UsageSummary::default();

        if let Ok(records) = self.records.read() {
            summary.call_count = records.len() as u64;
            for record in records.iter() {
                let tokens = record.usage.total();
                summary.cost_usd_total += record.cost_usd;
                if record.timestamp >= month {
                    summary.cost_usd_month += record.cost_usd;
                }
                if record.timestamp >= today {
                    summary.tokens_used_today = summary.tokens_used_today.saturating_add(tokens);
                    summary.cost_usd_today += record.cost_usd;
                }
                *summary
                    .tokens_by_provider
                    .entry(record.provider.clone())
                    .or_insert(0) += tokens;
                *summary
                    .tokens_by_model
                    .entry(record.model.clone())
                    .or_insert(0) += tokens;
            }
        }
        if let Ok(errors) = self.error_count.read() {
            summary.error_count = *errors;
        }
        summary
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker").finish_non_exhaustive()
    }
}
