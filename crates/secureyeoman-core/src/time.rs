//! Millisecond-precision timestamps.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unix-epoch-millisecond timestamp.
///
/// Stored as an integer so it serializes deterministically (canonical JSON
/// forbids floats) and compares cheaply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Create a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Epoch milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a `DateTime<Utc>`.
    ///
    /// Out-of-range values clamp to the epoch.
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .unwrap_or_default()
    }

    /// Create from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Milliseconds elapsed since this timestamp (zero if in the future).
    #[must_use]
    pub fn elapsed_millis(&self) -> i64 {
        (Utc::now().timestamp_millis().saturating_sub(self.0)).max(0)
    }

    /// Check if this timestamp is in the past.
    #[must_use]
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now().timestamp_millis()
    }

    /// The start of the current local day, as a UTC timestamp.
    ///
    /// Used for "today" aggregation windows.
    #[must_use]
    pub fn start_of_today() -> Self {
        let now = chrono::Local::now();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_else(|| now.naive_local());
        match midnight.and_local_timezone(chrono::Local) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                Self(dt.timestamp_millis())
            },
            chrono::LocalResult::None => Self(now.timestamp_millis()),
        }
    }

    /// The start of the current local month, as a UTC timestamp.
    #[must_use]
    pub fn start_of_month() -> Self {
        let now = chrono::Local::now();
        let first = now
            .date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_else(|| now.naive_local());
        match first.and_local_timezone(chrono::Local) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                Self(dt.timestamp_millis())
            },
            chrono::LocalResult::None => Self(now.timestamp_millis()),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}
