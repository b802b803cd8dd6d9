//! Circuit breaker example walking one breaker through its full lifecycle.
//!
//! This example shows how to:
//! - Trip a breaker by hammering a failing dependency
//! - Observe fast-fail behavior while the circuit is open
//! - Watch recovery through half-open trial calls
//! - Share breakers between call sites with the registry
//!
//! # Running
//!
//! ```bash
//! cargo run --example breaker_lifecycle
//! ```

use failguard::{
    CircuitBreakerConfig, CircuitBreakerRegistry, ClassifiedError,
};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let registry = CircuitBreakerRegistry::new();
    let breaker = registry
        .get_or_create_with(
            "vote-api",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_millis(500),
                half_open_max_calls: 2,
                minimum_throughput: 1,
                ..Default::default()
            },
        )
        .await;

    println!("=== Tripping the Breaker ===\n");
    for i in 1..=3 {
        let result = breaker
            .execute(|| async {
                Err::<(), _>(ClassifiedError::external_api("vote-api timed out"))
            })
            .await;
        println!(
            "  call {}: {} (state: {})",
            i,
            result.unwrap_err().code(),
            breaker.state().await
        );
    }

    println!("\n=== Fast-Fail While Open ===\n");
    let result = breaker
        .execute(|| async { Ok::<_, ClassifiedError>("never runs") })
        .await;
    let error = result.unwrap_err();
    println!("  rejected: {}", error.code());
    println!("  user sees: {}", error.user_message());

    println!("\n=== Recovery ===\n");
    tokio::time::sleep(Duration::from_millis(600)).await;
    for i in 1..=2 {
        let result = breaker
            .execute(|| async { Ok::<_, ClassifiedError>("vote counts") })
            .await;
        println!(
            "  trial {}: {:?} (state: {})",
            i,
            result.unwrap(),
            breaker.state().await
        );
    }

    println!("\n=== Final Stats ===\n");
    for stats in registry.all_stats().await {
        println!(
            "  {}: state={} total={} failures={} rejected={} error_rate={:.2}",
            stats.name,
            stats.state,
            stats.total_calls,
            stats.failure_count,
            stats.rejected_calls,
            stats.error_rate
        );
    }
}
