//! Top-level configuration bundle.
//!
//! One serializable struct carrying the retry, breaker, and tracker configs
//! so an application can load the whole resilience setup from its settings
//! file and validate it before wiring anything.

use crate::breaker::CircuitBreakerConfig;
use crate::error::{ClassifiedError, FailguardResult};
use crate::retry::RetryPolicy;
use crate::tracker::TrackerConfig;
use serde::{Deserialize, Serialize};

/// Combined configuration for the resilience core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Default retry policy applied by the facade.
    pub retry: RetryPolicy,
    /// Default config for breakers created through the registry.
    pub breaker: CircuitBreakerConfig,
    /// Error tracker configuration.
    pub tracker: TrackerConfig,
}

impl ResilienceConfig {
    /// Validate the configuration is usable.
    ///
    /// Returns a `VALIDATION_ERROR` classified error naming the first
    /// offending field.
    pub fn validate(&self) -> FailguardResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(ClassifiedError::validation(
                "retry.max_attempts must be at least 1",
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ClassifiedError::validation(
                "retry.base_delay must not exceed retry.max_delay",
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(ClassifiedError::validation(
                "breaker.failure_threshold must be at least 1",
            ));
        }
        if self.breaker.half_open_max_calls == 0 {
            return Err(ClassifiedError::validation(
                "breaker.half_open_max_calls must be at least 1",
            ));
        }
        if self.breaker.minimum_throughput == 0 {
            return Err(ClassifiedError::validation(
                "breaker.minimum_throughput must be at least 1",
            ));
        }
        if !(self.breaker.expected_error_rate > 0.0 && self.breaker.expected_error_rate <= 1.0) {
            return Err(ClassifiedError::validation(
                "breaker.expected_error_rate must be within (0.0, 1.0]",
            ));
        }
        if self.tracker.compact_to > self.tracker.max_buffered {
            return Err(ClassifiedError::validation(
                "tracker.compact_to must not exceed tracker.max_buffered",
            ));
        }
        if self.tracker.error_threshold == 0 {
            return Err(ClassifiedError::validation(
                "tracker.error_threshold must be at least 1",
            ));
        }
        if self.tracker.retention_days <= 0 {
            return Err(ClassifiedError::validation(
                "tracker.retention_days must be positive",
            ));
        }
        Ok(())
    }
}
