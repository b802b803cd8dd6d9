//! Integration tests for the resilience facade.
//!
//! Exercises the full control flow: the named breaker admits the call, the
//! retry executor drives the operation, and terminal failures land in the
//! error tracker.

mod common;

use common::{fast_service_config, RecordingNotifier, RecordingStore};
use failguard::{
    codes, ClassifiedError, CircuitState, Resilience, ResilienceConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// INTEGRATION UNDER TEST: Resilience (facade over breaker + retry + tracker)
//
// BUSINESS RESPONSIBILITY:
//   - Wraps dependency calls in the canonical breaker-around-retry order
//   - Shares one breaker per dependency name across call sites
//   - Records every terminal failure with the tracker, stamped with the
//     dependency as its component
//   - Validates configuration before any wiring happens
//
// TEST COVERAGE:
//   - Success path leaves no failure residue
//   - Retry exhaustion reaches the tracker and trips the breaker over time
//   - Fast-fail behavior once the dependency's breaker opens
//   - Recovery back to closed after the dependency heals

#[tokio::test]
async fn test_successful_call_leaves_no_failure_residue() {
    // Arrange
    let service = Resilience::new(fast_service_config()).unwrap();

    // Act
    let value = service
        .run("healthy-api", || async { Ok::<_, ClassifiedError>(7) })
        .await
        .unwrap();

    // Assert
    assert_eq!(value, 7);
    assert!(service.tracker().recent_errors(10).await.is_empty());
    let stats = service.registry().all_stats().await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].failure_count, 0);
}

#[tokio::test]
async fn test_terminal_failure_is_retried_then_tracked() {
    // Arrange
    let store = RecordingStore::new();
    let notifier = RecordingNotifier::new();
    let service = Resilience::with_sinks(
        fast_service_config(),
        Arc::new(store.clone()),
        Arc::new(notifier),
    )
    .unwrap();
    let invocations = Arc::new(AtomicU32::new(0));
    let invocations_clone = invocations.clone();

    // Act
    let result = service
        .run("party-api", move || {
            let invocations = invocations_clone.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ClassifiedError::network("connection refused"))
            }
        })
        .await;

    // Assert - retried to exhaustion, then surfaced and tracked
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        3,
        "The default policy retries the operation three times"
    );
    let error = result.unwrap_err();
    assert_eq!(error.code(), codes::RETRY_EXHAUSTED);

    let recent = service.tracker().recent_errors(10).await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].code, codes::RETRY_EXHAUSTED);
    assert_eq!(
        recent[0].component.as_deref(),
        Some("party-api"),
        "Terminal failures are stamped with the dependency name"
    );

    // The record also reached the persistence sink
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.stored().len(), 1);
}

#[tokio::test]
async fn test_repeated_failures_open_the_dependency_breaker() {
    // Arrange - breaker trips after 3 failed wrapped calls
    let service = Resilience::new(fast_service_config()).unwrap();

    // Act - each wrapped call is one breaker call that exhausts its retries
    for _ in 0..3 {
        let _ = service
            .run("flaky-api", || async {
                Err::<(), _>(ClassifiedError::network("down"))
            })
            .await;
    }

    // Assert - breaker is open and the next call fast-fails without
    // invoking the operation
    let breaker = service.registry().get("flaky-api").await.unwrap();
    assert_eq!(breaker.state().await, CircuitState::Open);

    let invocations = Arc::new(AtomicU32::new(0));
    let invocations_clone = invocations.clone();
    let result = service
        .run("flaky-api", move || {
            let invocations = invocations_clone.clone();
            async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ClassifiedError>("unreachable")
            }
        })
        .await;

    let error = result.unwrap_err();
    assert_eq!(error.code(), codes::CIRCUIT_BREAKER_OPEN);
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        0,
        "An open breaker must not invoke the operation"
    );

    // The fast-fail itself is a terminal failure and was tracked
    let recent = service.tracker().recent_errors(10).await;
    assert_eq!(recent[0].code, codes::CIRCUIT_BREAKER_OPEN);
}

#[tokio::test]
async fn test_dependency_recovers_through_half_open_trials() {
    // Arrange - open the breaker for the dependency
    let service = Resilience::new(fast_service_config()).unwrap();
    for _ in 0..3 {
        let _ = service
            .run("recovering-api", || async {
                Err::<(), _>(ClassifiedError::network("down"))
            })
            .await;
    }
    let breaker = service.registry().get("recovering-api").await.unwrap();
    assert_eq!(breaker.state().await, CircuitState::Open);

    // Act - wait out the recovery timeout, then succeed through the trials
    tokio::time::sleep(Duration::from_millis(60)).await;
    for _ in 0..2 {
        let result = service
            .run("recovering-api", || async {
                Ok::<_, ClassifiedError>("healed")
            })
            .await;
        assert!(result.is_ok());
    }

    // Assert
    assert_eq!(
        breaker.state().await,
        CircuitState::Closed,
        "Successful trials must close the breaker again"
    );
    assert_eq!(breaker.stats().await.failure_count, 0);
}

#[tokio::test]
async fn test_call_sites_share_one_breaker_per_dependency() {
    // Arrange
    let service = Arc::new(Resilience::new(fast_service_config()).unwrap());

    // Act - concurrent callers against the same dependency
    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .run("shared-api", || async {
                    Err::<(), _>(ClassifiedError::network("down"))
                })
                .await
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    // Assert - one breaker absorbed all the traffic
    let stats = service.registry().all_stats().await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].name, "shared-api");
    assert!(
        stats[0].total_calls >= 3,
        "All call sites must feed the same breaker's counters"
    );
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_at_construction() {
    // Arrange
    let mut config = ResilienceConfig::default();
    config.retry.max_attempts = 0;

    // Act
    let error = Resilience::new(config).unwrap_err();

    // Assert
    assert_eq!(error.code(), codes::VALIDATION_ERROR);
}
