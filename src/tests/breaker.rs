use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::error::{codes, ClassifiedError};
use crate::tests::helpers::fast_breaker_config;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[cfg(test)]
mod tests {
    use super::*;

    // Unit Tests for CircuitBreaker
    //
    // UNIT UNDER TEST: CircuitBreaker (concrete implementation)
    //
    // BUSINESS RESPONSIBILITY:
    //   - Tracks failure patterns to detect when a dependency becomes
    //     unhealthy and fails fast once it does
    //   - Requires minimum throughput before failure counting can trip the
    //     circuit, so cold starts don't open on a single hiccup
    //   - Probes recovery with a bounded number of half-open trial calls
    //   - Exposes accurate counters for dashboards and the registry
    //
    // TEST COVERAGE:
    //   - State transition logic for failure/success patterns
    //   - Throughput gating and error-rate based opening
    //   - Fast-fail behavior without invoking the wrapped operation
    //   - Recovery trials, reopening, and counter reset guarantees
    //   - Rolling failure-window expiry

    async fn fail_once(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(|| async { Err::<(), _>(ClassifiedError::network("dependency down")) })
            .await;
    }

    async fn succeed_once(breaker: &CircuitBreaker) {
        let result = breaker
            .execute(|| async { Ok::<_, ClassifiedError>(42) })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_breaker_stays_closed_on_success() {
        // Arrange
        let breaker = CircuitBreaker::new("healthy", fast_breaker_config());

        // Act
        for _ in 0..5 {
            succeed_once(&breaker).await;
        }

        // Assert
        assert_eq!(breaker.state().await, CircuitState::Closed);
        let stats = breaker.stats().await;
        assert_eq!(stats.total_calls, 5);
        assert_eq!(stats.success_count, 5);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_breaker_opens_after_threshold_with_sufficient_throughput() {
        // Test verifies 5 consecutive failures with threshold 3 and minimum
        // throughput 5 open the circuit

        // Arrange
        let breaker = CircuitBreaker::new(
            "flaky",
            CircuitBreakerConfig {
                failure_threshold: 3,
                minimum_throughput: 5,
                expected_error_rate: 1.0,
                ..fast_breaker_config()
            },
        );

        // Act - failures below throughput leave the circuit closed
        for _ in 0..4 {
            fail_once(&breaker).await;
            assert_eq!(
                breaker.state().await,
                CircuitState::Closed,
                "Circuit must not open before minimum throughput is reached"
            );
        }
        fail_once(&breaker).await;

        // Assert
        assert_eq!(breaker.state().await, CircuitState::Open);
        let stats = breaker.stats().await;
        assert_eq!(stats.failure_count, 5);
        assert_eq!(stats.total_calls, 5);
    }

    #[tokio::test]
    async fn test_breaker_stays_closed_below_minimum_throughput() {
        // Arrange
        let breaker = CircuitBreaker::new(
            "quiet",
            CircuitBreakerConfig {
                failure_threshold: 3,
                minimum_throughput: 5,
                expected_error_rate: 1.0,
                ..fast_breaker_config()
            },
        );

        // Act - only 2 failing calls, below the throughput gate
        fail_once(&breaker).await;
        fail_once(&breaker).await;

        // Assert
        assert_eq!(
            breaker.state().await,
            CircuitState::Closed,
            "Two failures below minimum throughput must leave the circuit closed"
        );
    }

    #[tokio::test]
    async fn test_breaker_opens_on_error_rate_above_expected() {
        // Arrange - absolute threshold out of reach, rate limit at 50%
        let breaker = CircuitBreaker::new(
            "rate-bound",
            CircuitBreakerConfig {
                failure_threshold: 100,
                minimum_throughput: 5,
                expected_error_rate: 0.5,
                ..fast_breaker_config()
            },
        );

        // Act - 2 successes then 3 failures: rate 3/5 = 0.6 > 0.5
        succeed_once(&breaker).await;
        succeed_once(&breaker).await;
        fail_once(&breaker).await;
        fail_once(&breaker).await;
        fail_once(&breaker).await;

        // Assert
        assert_eq!(
            breaker.state().await,
            CircuitState::Open,
            "Error rate above expected_error_rate must open the circuit"
        );
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast_without_invoking_operation() {
        // Arrange
        let breaker = CircuitBreaker::new("down", fast_breaker_config());
        for _ in 0..3 {
            fail_once(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
        let calls_before = breaker.stats().await.total_calls;

        // Act - a never-failing operation behind an open circuit
        let invocations = Arc::new(AtomicU32::new(0));
        let invocations_clone = invocations.clone();
        let result = breaker
            .execute(move || {
                let invocations = invocations_clone.clone();
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ClassifiedError>("never reached")
                }
            })
            .await;

        // Assert
        let error = result.unwrap_err();
        assert_eq!(error.code(), codes::CIRCUIT_BREAKER_OPEN);
        assert!(
            error.user_message().contains("temporarily unavailable"),
            "Open-circuit rejections carry the published user message"
        );
        assert_eq!(
            invocations.load(Ordering::SeqCst),
            0,
            "Operation must never be invoked while the circuit is open"
        );
        let stats = breaker.stats().await;
        assert_eq!(
            stats.total_calls, calls_before,
            "Rejected calls must not consume throughput"
        );
        assert_eq!(stats.rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_open_transitions_to_half_open_and_closes_after_trials() {
        // Test verifies the lazy Open -> HalfOpen transition and that
        // half_open_max_calls consecutive successes close the circuit with
        // failure_count reset to zero

        // Arrange
        let breaker = CircuitBreaker::new(
            "recovering",
            CircuitBreakerConfig {
                half_open_max_calls: 2,
                ..fast_breaker_config()
            },
        );
        for _ in 0..3 {
            fail_once(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Act - wait past the recovery timeout, then run trial calls
        sleep(Duration::from_millis(60)).await;
        succeed_once(&breaker).await;
        assert_eq!(
            breaker.state().await,
            CircuitState::HalfOpen,
            "One successful trial is not enough to close"
        );
        succeed_once(&breaker).await;

        // Assert
        assert_eq!(breaker.state().await, CircuitState::Closed);
        let stats = breaker.stats().await;
        assert_eq!(
            stats.failure_count, 0,
            "Closing after recovery must reset the failure count"
        );
    }

    #[tokio::test]
    async fn test_half_open_single_failure_reopens_circuit() {
        // Arrange
        let breaker = CircuitBreaker::new("relapsing", fast_breaker_config());
        for _ in 0..3 {
            fail_once(&breaker).await;
        }
        sleep(Duration::from_millis(60)).await;

        // Act - the first trial call fails
        fail_once(&breaker).await;

        // Assert
        assert_eq!(
            breaker.state().await,
            CircuitState::Open,
            "A single failed trial must reopen the circuit immediately"
        );

        // And the circuit rejects again without invoking the operation
        let result = breaker
            .execute(|| async { Ok::<_, ClassifiedError>(1) })
            .await;
        assert_eq!(result.unwrap_err().code(), codes::CIRCUIT_BREAKER_OPEN);
    }

    #[tokio::test]
    async fn test_half_open_rejects_trials_beyond_limit() {
        // Arrange - one trial slot, and a trial that holds it while a second
        // call arrives
        let breaker = Arc::new(CircuitBreaker::new(
            "probing",
            CircuitBreakerConfig {
                half_open_max_calls: 1,
                ..fast_breaker_config()
            },
        ));
        for _ in 0..3 {
            fail_once(&breaker).await;
        }
        sleep(Duration::from_millis(60)).await;

        // Act - first trial occupies the slot for a while
        let slow_breaker = Arc::clone(&breaker);
        let slow_trial = tokio::spawn(async move {
            slow_breaker
                .execute(|| async {
                    sleep(Duration::from_millis(50)).await;
                    Ok::<_, ClassifiedError>("slow trial")
                })
                .await
        });
        sleep(Duration::from_millis(10)).await;

        let result = breaker
            .execute(|| async { Ok::<_, ClassifiedError>("eager caller") })
            .await;

        // Assert
        let error = result.unwrap_err();
        assert_eq!(error.code(), codes::CIRCUIT_BREAKER_HALF_OPEN_LIMIT);
        assert!(
            error.user_message().contains("recovering"),
            "Half-open rejections tell the user the service is recovering"
        );
        assert!(slow_trial.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_failure_window_expires_old_failures() {
        // Arrange - short monitoring period, high thresholds so the circuit
        // stays closed while failures accumulate
        let breaker = CircuitBreaker::new(
            "aging",
            CircuitBreakerConfig {
                failure_threshold: 10,
                minimum_throughput: 100,
                monitoring_period: Duration::from_millis(40),
                ..fast_breaker_config()
            },
        );
        fail_once(&breaker).await;
        fail_once(&breaker).await;
        assert_eq!(breaker.stats().await.failure_count, 2);

        // Act - let the window pass, then make another call
        sleep(Duration::from_millis(60)).await;
        succeed_once(&breaker).await;

        // Assert - failures aged out, throughput did not
        let stats = breaker.stats().await;
        assert_eq!(
            stats.failure_count, 0,
            "Failures outside the monitoring period must be forgotten"
        );
        assert_eq!(
            stats.total_calls, 3,
            "Total call count is not reset by the rolling window"
        );
    }

    #[tokio::test]
    async fn test_reset_and_force_open() {
        // Arrange
        let breaker = CircuitBreaker::new("manual", fast_breaker_config());
        for _ in 0..3 {
            fail_once(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Act & Assert - reset forces closed with zeroed counters
        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        let stats = breaker.stats().await;
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.total_calls, 0);

        // Force open rejects immediately even with no failures
        breaker.force_open().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        let result = breaker
            .execute(|| async { Ok::<_, ClassifiedError>(1) })
            .await;
        assert_eq!(result.unwrap_err().code(), codes::CIRCUIT_BREAKER_OPEN);
    }

    #[tokio::test]
    async fn test_operation_failure_is_propagated_after_recording() {
        // Arrange
        let breaker = CircuitBreaker::new("passthrough", fast_breaker_config());

        // Act
        let result = breaker
            .execute(|| async {
                Err::<(), _>(ClassifiedError::database("row lock timeout"))
            })
            .await;

        // Assert - the caller sees the operation's own error, not a breaker error
        let error = result.unwrap_err();
        assert_eq!(error.code(), codes::DATABASE_ERROR);
        let stats = breaker.stats().await;
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.total_calls, 1);
    }
}
