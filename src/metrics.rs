//! Rolling-window error metrics.
//!
//! Pure projections over a slice of buffered error records. Nothing here is
//! authoritative state: the tracker recomputes these from its buffer, so the
//! functions take an explicit `now` and are trivially testable with
//! synthetic timestamps.

use crate::error::{ErrorCategory, ErrorSeverity};
use crate::tracker::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// How many offenders `top_errors` keeps.
const TOP_ERRORS_LIMIT: usize = 5;

/// One entry in the top-offenders list.
#[derive(Debug, Clone, Serialize)]
pub struct TopError {
    /// Stable error code.
    pub code: String,
    /// Occurrences within the window.
    pub count: u64,
    /// Most recent occurrence within the window.
    pub last_occurrence: DateTime<Utc>,
}

/// Derived, recomputed-on-demand snapshot of recent failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMetrics {
    /// Errors within the window.
    pub total_errors: u64,
    /// Counts keyed by category.
    pub errors_by_category: HashMap<ErrorCategory, u64>,
    /// Counts keyed by severity.
    pub errors_by_severity: HashMap<ErrorSeverity, u64>,
    /// Counts keyed by originating component.
    pub errors_by_component: HashMap<String, u64>,
    /// Errors per minute over the window.
    pub error_rate: f64,
    /// Top offenders ordered by count descending.
    pub top_errors: Vec<TopError>,
    /// Window the snapshot covers.
    pub window: Duration,
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

impl ErrorMetrics {
    /// An empty snapshot for the given window.
    pub fn empty(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            total_errors: 0,
            errors_by_category: HashMap::new(),
            errors_by_severity: HashMap::new(),
            errors_by_component: HashMap::new(),
            error_rate: 0.0,
            top_errors: Vec::new(),
            window,
            computed_at: now,
        }
    }
}

/// Compute metrics over records whose timestamps fall within
/// `(now - window, now]`.
pub fn compute_metrics(
    records: &[ErrorRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> ErrorMetrics {
    let cutoff = now - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

    let mut metrics = ErrorMetrics::empty(now, window);
    let mut by_code: HashMap<&str, (u64, DateTime<Utc>)> = HashMap::new();

    for record in records {
        if record.timestamp <= cutoff || record.timestamp > now {
            continue;
        }

        metrics.total_errors += 1;
        *metrics.errors_by_category.entry(record.category).or_insert(0) += 1;
        *metrics.errors_by_severity.entry(record.severity).or_insert(0) += 1;
        if let Some(component) = &record.component {
            *metrics
                .errors_by_component
                .entry(component.clone())
                .or_insert(0) += 1;
        }

        let entry = by_code
            .entry(record.code.as_str())
            .or_insert((0, record.timestamp));
        entry.0 += 1;
        if record.timestamp > entry.1 {
            entry.1 = record.timestamp;
        }
    }

    let minutes = window.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        metrics.error_rate = metrics.total_errors as f64 / minutes;
    }

    let mut top: Vec<TopError> = by_code
        .into_iter()
        .map(|(code, (count, last_occurrence))| TopError {
            code: code.to_string(),
            count,
            last_occurrence,
        })
        .collect();
    // Count descending; code ascending as a deterministic tie-break.
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    top.truncate(TOP_ERRORS_LIMIT);
    metrics.top_errors = top;

    metrics
}

/// Count records with timestamps in `(start, end]`.
pub fn count_in_window(
    records: &[ErrorRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> u64 {
    records
        .iter()
        .filter(|r| r.timestamp > start && r.timestamp <= end)
        .count() as u64
}
