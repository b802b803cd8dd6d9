//! Retry executor with configurable backoff.
//!
//! Runs an operation up to a configured number of attempts, consulting a
//! per-error retry predicate between attempts and suspending for a backoff
//! delay with optional jitter. Exhausted retries surface as a
//! `RETRY_EXHAUSTED` classified error that preserves the last underlying
//! failure's severity and category.

use crate::error::{codes, ClassifiedError, ErrorContext, FailguardResult};
use crate::logging::{log_debug, log_warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Backoff curve applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
    Exponential,
    /// `base_delay * attempt`, capped at `max_delay`.
    Linear,
    /// `base_delay` every time.
    Fixed,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Backoff curve between attempts.
    pub backoff: BackoffStrategy,
    /// Base delay fed into the backoff curve.
    pub base_delay: Duration,
    /// Cap on any single computed delay.
    pub max_delay: Duration,
    /// Multiply each delay by a uniform factor in [0.5, 1.0] to avoid
    /// synchronized retry storms across callers.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed,
            base_delay: delay,
            max_delay: delay,
            jitter: false,
        }
    }

    /// Exponential policy with the default 1s base and 30s cap.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }
}

/// Default retry predicate: defer to [`ClassifiedError::is_retryable`].
fn default_is_retryable(error: &ClassifiedError) -> bool {
    error.is_retryable()
}

/// Outcome record returned by [`RetryExecutor::execute_with_outcome`].
///
/// Used where the caller wants to branch on success without error-style
/// control flow and still see how much work the executor did.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result: the value, the non-retryable error, or the
    /// `RETRY_EXHAUSTED` error.
    pub result: FailguardResult<T>,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Wall-clock time spent across all attempts and backoff delays.
    pub total_time: Duration,
}

impl<T> RetryOutcome<T> {
    /// Whether the operation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Retry executor that applies a [`RetryPolicy`] to async operations.
///
/// # Example
///
/// ```rust,no_run
/// use failguard::{ClassifiedError, RetryExecutor, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), ClassifiedError> {
/// let executor = RetryExecutor::new(RetryPolicy::fixed(3, Duration::from_millis(100)));
///
/// let value = executor
///     .execute(|| async {
///         // Your potentially failing operation here
///         Ok::<_, ClassifiedError>(42)
///     })
///     .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct RetryExecutor {
    policy: RetryPolicy,
    is_retryable: fn(&ClassifiedError) -> bool,
    on_retry: Option<Box<dyn Fn(u32, &ClassifiedError) + Send + Sync>>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    /// Create an executor with the given policy and the default predicate
    /// (retry network/external-API categories and recoverable errors).
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            is_retryable: default_is_retryable,
            on_retry: None,
        }
    }

    /// Replace the retry predicate.
    pub fn with_retry_condition(mut self, is_retryable: fn(&ClassifiedError) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    /// Install an observability hook invoked before each backoff delay with
    /// the failed attempt number and the classified error.
    pub fn with_on_retry(
        mut self,
        on_retry: impl Fn(u32, &ClassifiedError) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(on_retry));
        self
    }

    /// The policy this executor applies.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute the operation, retrying per policy.
    ///
    /// Each failure is converted to a [`ClassifiedError`]. A failure the
    /// retry predicate rejects is returned as-is after a single invocation.
    /// Exhausting all attempts returns a `RETRY_EXHAUSTED` error carrying the
    /// attempt count and elapsed time, with the last failure as source.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> FailguardResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        self.execute_with_outcome(operation).await.result
    }

    /// Execute the operation and report the outcome as a record instead of
    /// propagating the error.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        log_debug!(
                            attempts = attempt,
                            total_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        total_time: start.elapsed(),
                    };
                }
                Err(raw) => {
                    let error: ClassifiedError = raw.into();

                    if !(self.is_retryable)(&error) {
                        log_debug!(
                            code = error.code(),
                            attempt = attempt,
                            "Error is not retryable, failing immediately"
                        );
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt,
                            total_time: start.elapsed(),
                        };
                    }

                    if attempt >= self.policy.max_attempts {
                        log_warn!(
                            attempts = attempt,
                            total_ms = start.elapsed().as_millis() as u64,
                            code = error.code(),
                            "Retry attempts exhausted"
                        );
                        return RetryOutcome {
                            result: Err(retry_exhausted(attempt, start.elapsed(), error)),
                            attempts: attempt,
                            total_time: start.elapsed(),
                        };
                    }

                    let mut delay = self.calculate_delay(attempt);
                    if self.policy.jitter {
                        delay = apply_jitter(delay);
                    }

                    if let Some(hook) = &self.on_retry {
                        hook(attempt, &error);
                    }

                    log_warn!(
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        code = error.code(),
                        "Attempt failed, retrying after delay"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Delay before the retry following the given failed attempt, before
    /// jitter is applied.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.policy.base_delay;
        let raw = match self.policy.backoff {
            BackoffStrategy::Exponential => {
                base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            }
            BackoffStrategy::Linear => base.saturating_mul(attempt),
            BackoffStrategy::Fixed => base,
        };
        raw.min(self.policy.max_delay)
    }
}

/// Multiply the delay by a uniform random factor in [0.5, 1.0].
fn apply_jitter(delay: Duration) -> Duration {
    let factor = 0.5 + fastrand::f64() * 0.5;
    delay.mul_f64(factor)
}

/// Build the terminal error for an exhausted retry loop.
///
/// Severity and category come from the last underlying error so alerting
/// rules see the real failure kind, not a generic wrapper.
fn retry_exhausted(attempts: u32, elapsed: Duration, last: ClassifiedError) -> ClassifiedError {
    let context = ErrorContext::new()
        .with_metadata("attempts", attempts)
        .with_metadata("elapsed_ms", elapsed.as_millis() as u64)
        .with_metadata("last_error_code", last.code());

    ClassifiedError::new(
        format!(
            "Operation failed after {} attempts: {}",
            attempts,
            last.message()
        ),
        codes::RETRY_EXHAUSTED,
        last.severity(),
        last.category(),
    )
    .with_context(context)
    .recoverable_flag(false)
    .with_user_message(last.user_message().to_string())
    .with_source(last)
}
