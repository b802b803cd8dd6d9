//! Error tracker example demonstrating alert rules and rolling metrics.
//!
//! This example shows how to:
//! - Feed classified failures into the tracker
//! - Trigger the immediate (critical, new-error) and periodic (threshold)
//!   alert rules
//! - Read metrics and manage alerts through the dashboard contract
//!
//! # Running
//!
//! ```bash
//! cargo run --example tracker_alerting
//! ```

use failguard::{
    codes, ClassifiedError, ErrorCategory, ErrorRecord, ErrorSeverity, ErrorTracker,
    TrackerConfig,
};

#[tokio::main]
async fn main() {
    let tracker = ErrorTracker::new(TrackerConfig::default());
    tracker.start().await;

    println!("=== Ingesting a Burst of Failures ===\n");
    for i in 0..12 {
        let error = ClassifiedError::network(format!("connection reset #{i}"));
        tracker
            .track(ErrorRecord::from(&error).with_component("feed-loader"))
            .await;
    }
    let critical = ClassifiedError::new(
        "integrity check failed",
        codes::DATABASE_ERROR,
        ErrorSeverity::Critical,
        ErrorCategory::Database,
    );
    tracker
        .track(
            ErrorRecord::from(&critical)
                .with_component("party-store")
                .with_breadcrumb("nightly consistency sweep"),
        )
        .await;

    // Normally the 30s tick does this; force an evaluation for the demo
    tracker.evaluate_alert_rules().await;

    println!("=== Alerts ===\n");
    for alert in tracker.alerts(true).await {
        println!(
            "  [{:?}/{:?}] {} (errors: {})",
            alert.alert_type, alert.severity, alert.message, alert.error_count
        );
    }

    println!("\n=== Metrics (trailing hour) ===\n");
    let metrics = tracker.metrics().await;
    println!("  total errors:   {}", metrics.total_errors);
    println!("  errors/minute:  {:.2}", metrics.error_rate);
    for (category, count) in &metrics.errors_by_category {
        println!("  {:?}: {}", category, count);
    }
    println!("  top offenders:");
    for top in &metrics.top_errors {
        println!("    {} x{}", top.code, top.count);
    }

    println!("\n=== Acknowledging ===\n");
    if let Some(alert) = tracker.alerts(true).await.first() {
        let done = tracker.resolve_alert(alert.id).await;
        println!("  resolved {}: {}", alert.id, done);
    }
    println!(
        "  unacknowledged alerts remaining: {}",
        tracker.alerts(true).await.len()
    );

    tracker.stop().await;
}
