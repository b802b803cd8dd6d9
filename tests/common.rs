//! Test helper utilities for failguard tests
//!
//! This module provides reusable test fixtures and helper functions
//! that are shared across multiple test modules.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use async_trait::async_trait;
use failguard::{
    AlertNotifier, BackoffStrategy, CircuitBreakerConfig, ErrorAlert, ErrorRecord, ErrorStore,
    ResilienceConfig, RetryPolicy, TrackerConfig,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store that records everything it is asked to persist.
#[derive(Default, Clone)]
pub struct RecordingStore {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<ErrorRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorStore for RecordingStore {
    async fn store(&self, record: &ErrorRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Notifier that records every alert it is asked to deliver.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<ErrorAlert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<ErrorAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &ErrorAlert) -> anyhow::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Fast retry policy to keep integration tests from sleeping for real
/// backoff delays.
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: BackoffStrategy::Fixed,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(5),
        jitter: false,
    }
}

/// Breaker config with millisecond timings and no throughput gate.
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

/// Tracker config matching the published alerting defaults but safe to
/// start in tests (long ticks so background tasks stay quiet).
pub fn quiet_tracker_config() -> TrackerConfig {
    TrackerConfig {
        error_threshold: 10,
        alert_tick: Duration::from_secs(3600),
        metrics_tick: Duration::from_secs(60),
        cleanup_tick: Duration::from_secs(3600),
        ..Default::default()
    }
}

/// Full service config wired for fast integration tests.
pub fn fast_service_config() -> ResilienceConfig {
    ResilienceConfig {
        retry: fast_retry_policy(3),
        breaker: fast_breaker_config(),
        tracker: quiet_tracker_config(),
    }
}
