//! Retry executor example demonstrating backoff strategies and outcomes.
//!
//! This example shows how to:
//! - Classify failures and check retryability
//! - Run a flaky operation through the retry executor
//! - Compare the three backoff curves
//! - Use the outcome variant to branch without error control flow
//!
//! # Running
//!
//! ```bash
//! cargo run --example retry_basics
//! ```

use failguard::{
    BackoffStrategy, ClassifiedError, RetryExecutor, RetryPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Demonstrates which classified errors the default predicate retries
fn demonstrate_retryability() {
    println!("=== Retryability by Error Kind ===\n");

    let errors = vec![
        ClassifiedError::network("connection reset"),
        ClassifiedError::external_api("upstream returned 503"),
        ClassifiedError::database("row lock timeout"),
        ClassifiedError::authorization("missing admin role"),
    ];

    for error in errors {
        let verdict = if error.is_retryable() {
            "RETRY"
        } else {
            "DO NOT RETRY"
        };
        println!("  {} -> {}", error, verdict);
    }
    println!();
}

/// Demonstrates the delay curves before jitter
fn demonstrate_backoff_curves() {
    println!("=== Backoff Curves (base 1s, cap 30s) ===\n");

    for strategy in [
        BackoffStrategy::Exponential,
        BackoffStrategy::Linear,
        BackoffStrategy::Fixed,
    ] {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 6,
            backoff: strategy,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        });
        let delays: Vec<String> = (1..=6)
            .map(|k| format!("{}s", executor.calculate_delay(k).as_secs()))
            .collect();
        println!("  {:?}: {}", strategy, delays.join(", "));
    }
    println!();
}

/// Runs a flaky operation that succeeds on the third attempt
async fn demonstrate_flaky_operation() {
    println!("=== Flaky Operation with Observability Hook ===\n");

    let executor = RetryExecutor::new(RetryPolicy {
        max_attempts: 5,
        backoff: BackoffStrategy::Exponential,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        jitter: true,
    })
    .with_on_retry(|attempt, error| {
        println!("  attempt {} failed: {}", attempt, error.user_message());
    });

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let result = executor
        .execute(move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClassifiedError::network("socket closed"))
                } else {
                    Ok("party list loaded")
                }
            }
        })
        .await;

    println!("  final result: {:?}\n", result.unwrap());
}

/// Uses the outcome record to branch on success without error flow
async fn demonstrate_outcome_variant() {
    println!("=== Outcome Record ===\n");

    let executor = RetryExecutor::new(RetryPolicy::fixed(3, Duration::from_millis(50)));
    let outcome = executor
        .execute_with_outcome(|| async {
            Err::<(), _>(ClassifiedError::external_api("upstream is down"))
        })
        .await;

    println!("  success:   {}", outcome.is_success());
    println!("  attempts:  {}", outcome.attempts);
    println!("  total:     {:?}", outcome.total_time);
    if let Err(error) = outcome.result {
        println!("  error:     {} ({})", error.code(), error.user_message());
    }
}

#[tokio::main]
async fn main() {
    demonstrate_retryability();
    demonstrate_backoff_curves();
    demonstrate_flaky_operation().await;
    demonstrate_outcome_variant().await;
}
