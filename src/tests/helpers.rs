//! Helper functions for unit tests
//!
//! Common builders for fast policies and synthetic error records so timing
//! sensitive tests stay fast and deterministic.

use crate::breaker::CircuitBreakerConfig;
use crate::error::{ErrorCategory, ErrorSeverity};
use crate::retry::{BackoffStrategy, RetryPolicy};
use crate::tracker::{ErrorRecord, TrackerConfig};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Fast retry policy to keep tests from sleeping for real backoff delays.
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: BackoffStrategy::Fixed,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

/// Breaker config with millisecond timings for recovery tests.
pub fn fast_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 3,
        recovery_timeout: Duration::from_millis(50),
        monitoring_period: Duration::from_secs(60),
        half_open_max_calls: 2,
        expected_error_rate: 1.0,
        minimum_throughput: 1,
    }
}

/// Tracker config with a small buffer and no real ticks started.
pub fn fast_tracker_config() -> TrackerConfig {
    TrackerConfig {
        max_buffered: 100,
        compact_to: 50,
        error_threshold: 10,
        spike_threshold_pct: 200.0,
        alert_cooldown: Duration::from_secs(15 * 60),
        alert_window: Duration::from_secs(60),
        metrics_window: Duration::from_secs(60 * 60),
        ..Default::default()
    }
}

/// Synthetic record `age` before `now`.
pub fn record_at(
    code: &str,
    category: ErrorCategory,
    severity: ErrorSeverity,
    now: DateTime<Utc>,
    age: ChronoDuration,
) -> ErrorRecord {
    ErrorRecord::new(code, format!("synthetic {code}"), category, severity)
        .with_timestamp(now - age)
}

/// Synthetic network/medium record `age_secs` seconds before `now`.
pub fn network_record(now: DateTime<Utc>, age_secs: i64) -> ErrorRecord {
    record_at(
        crate::error::codes::NETWORK_ERROR,
        ErrorCategory::Network,
        ErrorSeverity::Medium,
        now,
        ChronoDuration::seconds(age_secs),
    )
}
