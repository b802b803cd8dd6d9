//! Error tracking, alert rules, and rolling metrics.
//!
//! The tracker is the sink for every terminal failure in the system. It
//! buffers incoming records in a bounded ring, forwards them to the
//! persistence sink without blocking the caller, evaluates alert rules
//! (immediate and periodic, each with an independent cooldown), and serves
//! rolling metrics over the buffered window.
//!
//! The tracker has an explicit lifecycle: construction wires config and
//! sinks but spawns nothing; [`start`](ErrorTracker::start) launches the
//! periodic evaluation tasks and [`stop`](ErrorTracker::stop) tears them
//! down. Clones share state, so one instance can be handed to call sites
//! while the original drives the lifecycle.

use crate::error::{ClassifiedError, ErrorCategory, ErrorSeverity};
use crate::logging::{log_debug, log_info, log_warn};
use crate::metrics::{compute_metrics, count_in_window, ErrorMetrics};
use crate::sinks::{AlertNotifier, ErrorStore, LogNotifier, NullStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Alert rule kinds. Each kind has its own cooldown clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Error count in the trailing window reached the threshold.
    Threshold,
    /// Error count grew sharply versus the preceding window.
    Spike,
    /// A single critical-severity error was reported.
    Critical,
    /// An error code not seen in the recent buffer appeared.
    NewError,
}

/// An alert raised by rule evaluation.
///
/// Mutated only through [`ErrorTracker::acknowledge_alert`] and
/// [`ErrorTracker::resolve_alert`]; retained until the retention sweep drops
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAlert {
    /// Unique alert id.
    pub id: Uuid,
    /// Which rule fired.
    pub alert_type: AlertType,
    /// Severity of the alert itself.
    pub severity: ErrorSeverity,
    /// Human-readable description.
    pub message: String,
    /// When the rule fired.
    pub timestamp: DateTime<Utc>,
    /// Error count that satisfied the rule.
    pub error_count: u64,
    /// Window the count was taken over (zero for immediate rules).
    pub time_window: Duration,
    /// Whether an operator has acknowledged the alert.
    pub acknowledged: bool,
    /// When the alert was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Snapshot of one failure as ingested by the tracker.
///
/// This is the serializable projection of a [`ClassifiedError`]: the tracker
/// keeps these in its ring buffer and forwards them to the persistence sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Unique record id.
    pub id: Uuid,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
    /// Stable error code.
    pub code: String,
    /// Diagnostic message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Error severity.
    pub severity: ErrorSeverity,
    /// Component where the failure originated.
    pub component: Option<String>,
    /// Affected user, if known.
    pub user_id: Option<String>,
    /// Affected session, if known.
    pub session_id: Option<String>,
    /// URL being served when the failure occurred.
    pub url: Option<String>,
    /// User agent of the affected client.
    pub user_agent: Option<String>,
    /// Captured stack text, if any.
    pub stack: Option<String>,
    /// Serialized context metadata.
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Breadcrumb trail leading up to the failure.
    pub breadcrumbs: Vec<String>,
}

impl ErrorRecord {
    /// Create a record with a fresh id and the current timestamp.
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            code: code.into(),
            message: message.into(),
            category,
            severity,
            component: None,
            user_id: None,
            session_id: None,
            url: None,
            user_agent: None,
            stack: None,
            context: serde_json::Map::new(),
            breadcrumbs: Vec::new(),
        }
    }

    /// Override the observation timestamp (backfill, replay).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the originating component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the URL being served.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the client user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Attach captured stack text.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Append one breadcrumb.
    pub fn with_breadcrumb(mut self, breadcrumb: impl Into<String>) -> Self {
        self.breadcrumbs.push(breadcrumb.into());
        self
    }
}

impl From<&ClassifiedError> for ErrorRecord {
    fn from(error: &ClassifiedError) -> Self {
        let context = error.context();
        Self {
            id: Uuid::new_v4(),
            timestamp: context.timestamp,
            code: error.code().to_string(),
            message: error.message().to_string(),
            category: error.category(),
            severity: error.severity(),
            component: context.component.clone(),
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            url: None,
            user_agent: None,
            stack: None,
            context: context.metadata.clone(),
            breadcrumbs: Vec::new(),
        }
    }
}

/// Error tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Ring buffer high-water mark.
    pub max_buffered: usize,
    /// Buffer size after compaction when the high-water mark is exceeded.
    pub compact_to: usize,
    /// Errors in the alert window that trigger a threshold alert.
    pub error_threshold: u64,
    /// Percentage increase versus the previous window that triggers a spike
    /// alert.
    pub spike_threshold_pct: f64,
    /// Minimum interval between two alerts of the same type.
    pub alert_cooldown: Duration,
    /// Trailing window the threshold and spike rules evaluate.
    pub alert_window: Duration,
    /// Trailing window metrics are computed over.
    pub metrics_window: Duration,
    /// Cadence of periodic alert rule evaluation.
    pub alert_tick: Duration,
    /// Cadence of metrics recomputation, and the staleness bound for lazy
    /// recomputation on read.
    pub metrics_tick: Duration,
    /// Cadence of the retention sweep.
    pub cleanup_tick: Duration,
    /// Age beyond which records, resolved alerts, and cooldown entries are
    /// dropped.
    pub retention_days: i64,
    /// How many recent records the new-error rule scans.
    pub new_error_scan: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_buffered: 1000,
            compact_to: 500,
            error_threshold: 10,
            spike_threshold_pct: 200.0,
            alert_cooldown: Duration::from_secs(15 * 60),
            alert_window: Duration::from_secs(60),
            metrics_window: Duration::from_secs(60 * 60),
            alert_tick: Duration::from_secs(30),
            metrics_tick: Duration::from_secs(60),
            cleanup_tick: Duration::from_secs(60 * 60),
            retention_days: 30,
            new_error_scan: 100,
        }
    }
}

/// Mutable tracker state guarded by one lock.
struct TrackerState {
    buffer: VecDeque<ErrorRecord>,
    alerts: Vec<ErrorAlert>,
    cooldowns: HashMap<AlertType, DateTime<Utc>>,
    metrics_cache: Option<ErrorMetrics>,
}

struct TrackerInner {
    config: TrackerConfig,
    store: Arc<dyn ErrorStore>,
    notifier: Arc<dyn AlertNotifier>,
    state: RwLock<TrackerState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Buffering, alerting, metrics service for classified errors.
///
/// ```rust,no_run
/// use failguard::{ClassifiedError, ErrorRecord, ErrorTracker, TrackerConfig};
///
/// # async fn example() {
/// let tracker = ErrorTracker::new(TrackerConfig::default());
/// tracker.start().await;
///
/// let error = ClassifiedError::network("connection refused");
/// tracker.track(ErrorRecord::from(&error)).await;
///
/// let metrics = tracker.metrics().await;
/// println!("{} errors in the last hour", metrics.total_errors);
///
/// tracker.stop().await;
/// # }
/// ```
#[derive(Clone)]
pub struct ErrorTracker {
    inner: Arc<TrackerInner>,
}

impl ErrorTracker {
    /// Create a tracker with no external sinks: records are discarded after
    /// buffering and alerts go to the log.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_sinks(config, Arc::new(NullStore), Arc::new(LogNotifier))
    }

    /// Create a tracker forwarding to the given persistence and alerting
    /// sinks.
    pub fn with_sinks(
        config: TrackerConfig,
        store: Arc<dyn ErrorStore>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config,
                store,
                notifier,
                state: RwLock::new(TrackerState {
                    buffer: VecDeque::new(),
                    alerts: Vec::new(),
                    cooldowns: HashMap::new(),
                    metrics_cache: None,
                }),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The configuration this tracker runs with.
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Launch the periodic evaluation tasks (alert rules, metrics refresh,
    /// retention sweep). Idempotent: calling on a started tracker does
    /// nothing.
    pub async fn start(&self) {
        let mut tasks = self.inner.tasks.lock().await;
        if !tasks.is_empty() {
            return;
        }

        let config = &self.inner.config;

        let tracker = self.clone();
        let tick = config.alert_tick;
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                tracker.evaluate_alert_rules().await;
            }
        }));

        let tracker = self.clone();
        let tick = config.metrics_tick;
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                let _ = tracker.metrics().await;
            }
        }));

        let tracker = self.clone();
        let tick = config.cleanup_tick;
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                tracker.run_cleanup().await;
            }
        }));

        log_info!("Error tracker started");
    }

    /// Tear down the periodic tasks. Buffered state is kept.
    pub async fn stop(&self) {
        let mut tasks = self.inner.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        log_info!("Error tracker stopped");
    }

    /// Ingest one failure record.
    ///
    /// Appends to the ring buffer (compacting under pressure), forwards the
    /// record to the persistence sink without awaiting it, and evaluates the
    /// immediate alert rules (critical severity, unseen error code) before
    /// returning.
    pub async fn track(&self, record: ErrorRecord) {
        self.track_at(record, Utc::now()).await;
    }

    /// Convert and ingest a classified error directly.
    pub async fn track_classified(&self, error: &ClassifiedError) {
        self.track(ErrorRecord::from(error)).await;
    }

    pub(crate) async fn track_at(&self, record: ErrorRecord, now: DateTime<Utc>) {
        let store = Arc::clone(&self.inner.store);
        let persisted = record.clone();
        tokio::spawn(async move {
            if let Err(err) = store.store(&persisted).await {
                log_warn!(
                    target: "failguard::sink",
                    error = %err,
                    record_id = %persisted.id,
                    "Error store rejected record"
                );
            }
        });

        let config = &self.inner.config;
        let mut state = self.inner.state.write().await;

        // Immediate rules run against the buffer as it was before this
        // record, otherwise a new code would always count as "seen".
        if record.severity == ErrorSeverity::Critical {
            self.emit_alert_locked(
                &mut state,
                now,
                AlertType::Critical,
                ErrorSeverity::Critical,
                format!("Critical error reported: {}: {}", record.code, record.message),
                1,
                Duration::ZERO,
            );
        }

        let seen_recently = state
            .buffer
            .iter()
            .rev()
            .take(config.new_error_scan)
            .any(|r| r.code == record.code);
        if !seen_recently {
            self.emit_alert_locked(
                &mut state,
                now,
                AlertType::NewError,
                ErrorSeverity::Medium,
                format!("New error type observed: {}", record.code),
                1,
                Duration::ZERO,
            );
        }

        state.buffer.push_back(record);
        if state.buffer.len() > config.max_buffered {
            let excess = state.buffer.len() - config.compact_to;
            state.buffer.drain(..excess);
            log_debug!(
                dropped = excess,
                retained = config.compact_to,
                "Compacted error buffer under pressure"
            );
        }
    }

    /// Evaluate the periodic alert rules (threshold, spike) against the
    /// trailing window. Called from the alert tick; exposed for callers that
    /// want an immediate evaluation.
    pub async fn evaluate_alert_rules(&self) {
        self.evaluate_alert_rules_at(Utc::now()).await;
    }

    pub(crate) async fn evaluate_alert_rules_at(&self, now: DateTime<Utc>) {
        let config = &self.inner.config;
        let window = to_chrono(config.alert_window);
        let mut state = self.inner.state.write().await;

        let records: Vec<ErrorRecord> = state.buffer.iter().cloned().collect();
        let current = count_in_window(&records, now - window, now);
        let previous = count_in_window(&records, now - window - window, now - window);

        if current >= config.error_threshold {
            self.emit_alert_locked(
                &mut state,
                now,
                AlertType::Threshold,
                ErrorSeverity::High,
                format!(
                    "Error threshold exceeded: {} errors in the last {}s",
                    current,
                    config.alert_window.as_secs()
                ),
                current,
                config.alert_window,
            );
        }

        // Spike needs a non-empty baseline; a jump from zero is the
        // new-error rule's business, not a percentage increase.
        if previous > 0 && current > previous {
            let increase_pct = (current - previous) as f64 / previous as f64 * 100.0;
            if increase_pct >= config.spike_threshold_pct {
                self.emit_alert_locked(
                    &mut state,
                    now,
                    AlertType::Spike,
                    ErrorSeverity::High,
                    format!(
                        "Error spike detected: {:.0}% increase over the previous {}s window",
                        increase_pct,
                        config.alert_window.as_secs()
                    ),
                    current,
                    config.alert_window,
                );
            }
        }
    }

    /// Rolling metrics over the trailing metrics window.
    ///
    /// Served from the cached snapshot when it is younger than the metrics
    /// tick, recomputed otherwise.
    pub async fn metrics(&self) -> ErrorMetrics {
        self.metrics_at(Utc::now()).await
    }

    pub(crate) async fn metrics_at(&self, now: DateTime<Utc>) -> ErrorMetrics {
        let config = &self.inner.config;
        let staleness = to_chrono(config.metrics_tick);

        {
            let state = self.inner.state.read().await;
            if let Some(cached) = &state.metrics_cache {
                if now.signed_duration_since(cached.computed_at) < staleness {
                    return cached.clone();
                }
            }
        }

        let mut state = self.inner.state.write().await;
        let records: Vec<ErrorRecord> = state.buffer.iter().cloned().collect();
        let metrics = compute_metrics(&records, now, config.metrics_window);
        state.metrics_cache = Some(metrics.clone());
        metrics
    }

    /// Drop buffered records, resolved alerts, and cooldown entries older
    /// than the retention window.
    pub async fn run_cleanup(&self) {
        self.run_cleanup_at(Utc::now()).await;
    }

    pub(crate) async fn run_cleanup_at(&self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::days(self.inner.config.retention_days);
        let mut state = self.inner.state.write().await;

        let before = state.buffer.len();
        state.buffer.retain(|r| r.timestamp > cutoff);
        state
            .alerts
            .retain(|a| a.resolved_at.is_none() || a.timestamp > cutoff);
        state.cooldowns.retain(|_, last| *last > cutoff);

        let dropped = before - state.buffer.len();
        if dropped > 0 {
            log_debug!(dropped = dropped, "Retention sweep dropped old records");
        }
    }

    /// Alerts raised so far, optionally restricted to unacknowledged ones.
    /// Newest first.
    pub async fn alerts(&self, unacknowledged_only: bool) -> Vec<ErrorAlert> {
        let state = self.inner.state.read().await;
        let mut alerts: Vec<ErrorAlert> = state
            .alerts
            .iter()
            .filter(|a| !unacknowledged_only || !a.acknowledged)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    /// Mark an alert acknowledged. Returns false for unknown ids.
    pub async fn acknowledge_alert(&self, id: Uuid) -> bool {
        let mut state = self.inner.state.write().await;
        match state.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Mark an alert resolved (and acknowledged). Returns false for unknown
    /// ids.
    pub async fn resolve_alert(&self, id: Uuid) -> bool {
        let mut state = self.inner.state.write().await;
        match state.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                alert.resolved_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// The most recent `limit` buffered records, newest first.
    pub async fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let state = self.inner.state.read().await;
        state.buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Number of buffered records.
    pub async fn buffered_len(&self) -> usize {
        self.inner.state.read().await.buffer.len()
    }

    /// Raise an alert unless its type is cooling down, and hand it to the
    /// notifier without awaiting delivery.
    #[allow(clippy::too_many_arguments)]
    fn emit_alert_locked(
        &self,
        state: &mut TrackerState,
        now: DateTime<Utc>,
        alert_type: AlertType,
        severity: ErrorSeverity,
        message: String,
        error_count: u64,
        time_window: Duration,
    ) -> bool {
        let cooldown = to_chrono(self.inner.config.alert_cooldown);
        if let Some(last) = state.cooldowns.get(&alert_type) {
            if now.signed_duration_since(*last) < cooldown {
                log_debug!(
                    alert_type = ?alert_type,
                    "Alert suppressed by cooldown"
                );
                return false;
            }
        }
        state.cooldowns.insert(alert_type, now);

        let alert = ErrorAlert {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message,
            timestamp: now,
            error_count,
            time_window,
            acknowledged: false,
            resolved_at: None,
        };
        state.alerts.push(alert.clone());
        log_warn!(
            alert_type = ?alert_type,
            error_count = error_count,
            message = %alert.message,
            "Alert raised"
        );

        let notifier = Arc::clone(&self.inner.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&alert).await {
                log_warn!(
                    target: "failguard::sink",
                    error = %err,
                    alert_id = %alert.id,
                    "Alert notifier rejected alert"
                );
            }
        });
        true
    }
}

/// Convert a std duration to a chrono duration, saturating on overflow.
fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}
