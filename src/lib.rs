//! # failguard
//!
//! Resilience core: classified errors, a retry executor with configurable
//! backoff, per-dependency circuit breakers, and an error-tracking service
//! that aggregates recent failures into metrics and alerts.
//!
//! ## Key Features
//!
//! - **Classified errors**: every failure carries a stable code, severity,
//!   category, context, and recoverability flag
//! - **Retry executor**: exponential/linear/fixed backoff with jitter and a
//!   per-error retry predicate
//! - **Circuit breakers**: per-dependency Closed/Open/HalfOpen state
//!   machines with a shared registry
//! - **Error tracking**: bounded buffering, rolling metrics, and
//!   threshold/spike/critical/new-error alerts with cooldowns
//!
//! ## Example
//!
//! ```rust,no_run
//! use failguard::{ClassifiedError, Resilience, ResilienceConfig};
//!
//! # async fn example() -> Result<(), ClassifiedError> {
//! let service = Resilience::new(ResilienceConfig::default())?;
//! service.start().await;
//!
//! // The breaker for "politician-api" admits the call, the retry executor
//! // drives it, and terminal failures land in the tracker.
//! let result = service
//!     .run("politician-api", || async {
//!         Err::<(), _>(ClassifiedError::network("connection reset"))
//!     })
//!     .await;
//!
//! if let Err(err) = result {
//!     println!("{}", err.user_message());
//! }
//!
//! let metrics = service.tracker().metrics().await;
//! println!("{} errors in the last hour", metrics.total_errors);
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod service;
pub mod sinks;
pub mod tracker;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::ResilienceConfig;
pub use error::{
    classify_message, codes, ClassifiedError, ErrorCategory, ErrorContext, ErrorSeverity,
    FailguardResult,
};
pub use metrics::{ErrorMetrics, TopError};
pub use registry::CircuitBreakerRegistry;
pub use retry::{BackoffStrategy, RetryExecutor, RetryOutcome, RetryPolicy};
pub use service::Resilience;
pub use sinks::{AlertNotifier, ErrorStore, LogNotifier, NullStore};
pub use tracker::{AlertType, ErrorAlert, ErrorRecord, ErrorTracker, TrackerConfig};
