//! Outbound boundary traits for the error tracker.
//!
//! The tracker does not persist anything itself: records go to an
//! [`ErrorStore`] and alerts to an [`AlertNotifier`]. Both calls are
//! fire-and-forget from the tracker's point of view; a failing sink is
//! logged on the `failguard::sink` diagnostic target and never surfaces to
//! the code that reported the error.

use crate::tracker::{ErrorAlert, ErrorRecord};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Persistence boundary for raw error records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ErrorStore: Send + Sync {
    /// Store one error record.
    async fn store(&self, record: &ErrorRecord) -> anyhow::Result<()>;
}

/// Notification boundary for raised alerts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver one alert.
    async fn notify(&self, alert: &ErrorAlert) -> anyhow::Result<()>;
}

/// Store that discards every record. Default when no persistence is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl ErrorStore for NullStore {
    async fn store(&self, _record: &ErrorRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Notifier that writes alerts to the log. Default when no alerting
/// integration is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &ErrorAlert) -> anyhow::Result<()> {
        crate::logging::log_warn!(
            alert_type = ?alert.alert_type,
            severity = ?alert.severity,
            error_count = alert.error_count,
            message = %alert.message,
            "Alert raised"
        );
        Ok(())
    }
}
