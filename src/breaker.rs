//! Per-dependency circuit breaker.
//!
//! The circuit breaker wraps calls to one logical dependency and fails fast
//! once that dependency is deemed unhealthy, allowing it to recover without
//! being hammered by futile traffic.
//!
//! States:
//! - **Closed**: normal operation, calls pass through
//! - **Open**: failing fast, calls are rejected without invoking the operation
//! - **Half-open**: a bounded number of trial calls probe for recovery
//!
//! Transitions are evaluated lazily at call time; no background timer is
//! involved. All read-modify-write sequences on one breaker instance are
//! serialized by an instance-scoped lock, and the lock is never held across
//! the awaited operation.
//!
//! ```rust,no_run
//! use failguard::{CircuitBreaker, CircuitBreakerConfig, ClassifiedError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), ClassifiedError> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     recovery_timeout: Duration::from_secs(30),
//!     ..Default::default()
//! };
//! let breaker = CircuitBreaker::new("external-api", config);
//!
//! let result = breaker
//!     .execute(|| async {
//!         // Your potentially failing operation here
//!         Ok::<_, ClassifiedError>("result")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{codes, ClassifiedError, ErrorCategory, ErrorSeverity, FailguardResult};
use crate::logging::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected immediately.
    Open,
    /// Probing for recovery with a bounded number of trial calls.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within the monitoring period before the circuit opens.
    pub failure_threshold: u32,
    /// Time to wait in Open before admitting a half-open trial.
    pub recovery_timeout: Duration,
    /// Rolling window: `failure_count` resets once the last failure is older
    /// than this.
    pub monitoring_period: Duration,
    /// Maximum trial calls admitted while half-open.
    pub half_open_max_calls: u32,
    /// Failure ratio (failures / total calls) above which the circuit opens
    /// even below the absolute threshold.
    pub expected_error_rate: f64,
    /// Minimum calls before failure counting can open the circuit.
    pub minimum_throughput: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            monitoring_period: Duration::from_secs(60),
            half_open_max_calls: 3,
            expected_error_rate: 0.5,
            minimum_throughput: 10,
        }
    }
}

/// Snapshot of circuit breaker state and counters.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Name of the guarded dependency.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures within the current monitoring period.
    pub failure_count: u32,
    /// Successful calls since construction or reset.
    pub success_count: u64,
    /// Calls that actually invoked the operation.
    pub total_calls: u64,
    /// Calls rejected without invoking the operation.
    pub rejected_calls: u64,
    /// `failure_count / total_calls`, 0.0 when no calls were made.
    pub error_rate: f64,
    /// Time since the breaker was constructed.
    pub uptime: Duration,
    /// When the last failure was recorded.
    pub last_failure_time: Option<Instant>,
    /// When the last success was recorded.
    pub last_success_time: Option<Instant>,
}

/// Mutable state guarded by the instance lock.
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u64,
    total_calls: u64,
    rejected_calls: u64,
    half_open_calls: u32,
    half_open_successes: u32,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_calls: 0,
            rejected_calls: 0,
            half_open_calls: 0,
            half_open_successes: 0,
            last_failure_time: None,
            last_success_time: None,
            next_attempt_time: None,
        }
    }

    fn clear_trial_counters(&mut self) {
        self.half_open_calls = 0;
        self.half_open_successes = 0;
    }
}

/// Admission decision made before invoking the operation.
enum Admission {
    Allow,
    RejectOpen,
    RejectHalfOpenLimit,
}

/// Circuit breaker for one named dependency.
///
/// Created once per logical dependency (usually through
/// [`CircuitBreakerRegistry`](crate::CircuitBreakerRegistry)) and shared by
/// all call sites that talk to it.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    created_at: Instant,
    inner: RwLock<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker guarding the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            created_at: Instant::now(),
            inner: RwLock::new(BreakerState::new()),
        }
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was created with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation through the circuit breaker.
    ///
    /// While Open (and before the recovery timeout) the operation is never
    /// invoked and a `CIRCUIT_BREAKER_OPEN` error is returned. While
    /// half-open, trials beyond the configured limit are rejected with
    /// `CIRCUIT_BREAKER_HALF_OPEN_LIMIT`. Otherwise the operation runs and
    /// its own failure is propagated after being recorded.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> FailguardResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        match self.admit().await {
            Admission::RejectOpen => Err(self.open_error()),
            Admission::RejectHalfOpenLimit => Err(self.half_open_limit_error()),
            Admission::Allow => match operation().await {
                Ok(value) => {
                    self.on_success().await;
                    Ok(value)
                }
                Err(raw) => {
                    let error: ClassifiedError = raw.into();
                    self.on_failure().await;
                    Err(error)
                }
            },
        }
    }

    /// Decide whether the next call may invoke the operation.
    ///
    /// Performs the lazy time-based maintenance: rolling failure-window
    /// expiry and the Open → HalfOpen transition.
    async fn admit(&self) -> Admission {
        let mut s = self.inner.write().await;
        let now = Instant::now();

        // Rolling window: failures age out, throughput does not.
        if s.state == CircuitState::Closed {
            if let Some(last_failure) = s.last_failure_time {
                if now.duration_since(last_failure) > self.config.monitoring_period {
                    s.failure_count = 0;
                }
            }
        }

        if s.state == CircuitState::Open {
            match s.next_attempt_time {
                Some(at) if now >= at => {
                    s.state = CircuitState::HalfOpen;
                    s.clear_trial_counters();
                    log_info!(
                        breaker = %self.name,
                        "Circuit breaker transitioning to half-open"
                    );
                }
                _ => {
                    s.rejected_calls += 1;
                    return Admission::RejectOpen;
                }
            }
        }

        match s.state {
            CircuitState::Closed => {
                s.total_calls += 1;
                Admission::Allow
            }
            CircuitState::HalfOpen => {
                if s.half_open_calls < self.config.half_open_max_calls {
                    s.half_open_calls += 1;
                    s.total_calls += 1;
                    Admission::Allow
                } else {
                    s.rejected_calls += 1;
                    Admission::RejectHalfOpenLimit
                }
            }
            // Handled above; rejections returned early.
            CircuitState::Open => {
                s.rejected_calls += 1;
                Admission::RejectOpen
            }
        }
    }

    /// Record a successful call.
    async fn on_success(&self) {
        let mut s = self.inner.write().await;
        s.success_count += 1;
        s.last_success_time = Some(Instant::now());

        if s.state == CircuitState::HalfOpen {
            s.half_open_successes += 1;
            if s.half_open_successes >= self.config.half_open_max_calls {
                s.state = CircuitState::Closed;
                s.failure_count = 0;
                s.clear_trial_counters();
                s.next_attempt_time = None;
                log_info!(
                    breaker = %self.name,
                    "Circuit breaker closing after successful recovery trials"
                );
            }
        }
        // A success landing while Open is a late trial result from before a
        // reopen; it is counted but does not change state.
    }

    /// Record a failed call.
    async fn on_failure(&self) {
        let mut s = self.inner.write().await;
        let now = Instant::now();
        s.failure_count += 1;
        s.last_failure_time = Some(now);

        match s.state {
            CircuitState::HalfOpen => {
                s.state = CircuitState::Open;
                s.next_attempt_time = Some(now + self.config.recovery_timeout);
                s.clear_trial_counters();
                log_warn!(
                    breaker = %self.name,
                    "Circuit breaker reopening after failed recovery trial"
                );
            }
            CircuitState::Closed => {
                if s.total_calls >= u64::from(self.config.minimum_throughput) {
                    let rate = f64::from(s.failure_count) / s.total_calls as f64;
                    if s.failure_count >= self.config.failure_threshold
                        || rate > self.config.expected_error_rate
                    {
                        s.state = CircuitState::Open;
                        s.next_attempt_time = Some(now + self.config.recovery_timeout);
                        log_warn!(
                            breaker = %self.name,
                            failure_count = s.failure_count,
                            total_calls = s.total_calls,
                            error_rate = rate,
                            "Circuit breaker opening"
                        );
                    }
                }
            }
            // Late failure from an in-flight call; counted only.
            CircuitState::Open => {}
        }
    }

    /// Current state of the breaker.
    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    /// Snapshot of the breaker's counters and state.
    pub async fn stats(&self) -> CircuitBreakerStats {
        let s = self.inner.read().await;
        let error_rate = if s.total_calls > 0 {
            f64::from(s.failure_count) / s.total_calls as f64
        } else {
            0.0
        };

        CircuitBreakerStats {
            name: self.name.clone(),
            state: s.state,
            failure_count: s.failure_count,
            success_count: s.success_count,
            total_calls: s.total_calls,
            rejected_calls: s.rejected_calls,
            error_rate,
            uptime: self.created_at.elapsed(),
            last_failure_time: s.last_failure_time,
            last_success_time: s.last_success_time,
        }
    }

    /// Force Closed and zero all counters.
    pub async fn reset(&self) {
        let mut s = self.inner.write().await;
        *s = BreakerState::new();
        log_info!(breaker = %self.name, "Circuit breaker reset");
    }

    /// Force Open with a fresh recovery deadline.
    pub async fn force_open(&self) {
        let mut s = self.inner.write().await;
        s.state = CircuitState::Open;
        s.next_attempt_time = Some(Instant::now() + self.config.recovery_timeout);
        s.clear_trial_counters();
        log_warn!(breaker = %self.name, "Circuit breaker forcibly opened");
    }

    fn open_error(&self) -> ClassifiedError {
        ClassifiedError::new(
            format!("Circuit breaker '{}' is open", self.name),
            codes::CIRCUIT_BREAKER_OPEN,
            ErrorSeverity::High,
            ErrorCategory::System,
        )
        .recoverable_flag(false)
        .with_user_message("Service temporarily unavailable. Please try again later")
    }

    fn half_open_limit_error(&self) -> ClassifiedError {
        ClassifiedError::new(
            format!(
                "Circuit breaker '{}' is half-open and at its trial limit",
                self.name
            ),
            codes::CIRCUIT_BREAKER_HALF_OPEN_LIMIT,
            ErrorSeverity::Medium,
            ErrorCategory::System,
        )
        .recoverable_flag(false)
        .with_user_message("Service is recovering. Please try again shortly")
    }
}
