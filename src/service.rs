//! Resilience facade.
//!
//! Ties the subsystems together in the canonical order: the circuit breaker
//! wraps the retry executor, which wraps the operation, and any terminal
//! failure is recorded with the error tracker before being returned. Call
//! sites that want finer control can use the parts directly; this is the
//! one-stop entry point for the common case.

use crate::config::ResilienceConfig;
use crate::error::{ClassifiedError, FailguardResult};
use crate::logging::log_error;
use crate::registry::CircuitBreakerRegistry;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::sinks::{AlertNotifier, ErrorStore};
use crate::tracker::{ErrorRecord, ErrorTracker, TrackerConfig};
use std::future::Future;
use std::sync::Arc;

/// Unified resilience service.
///
/// ```rust,no_run
/// use failguard::{ClassifiedError, Resilience, ResilienceConfig};
///
/// # async fn example() -> Result<(), ClassifiedError> {
/// let service = Resilience::new(ResilienceConfig::default())?;
/// service.start().await;
///
/// let parties = service
///     .run("party-api", || async {
///         // Call the dependency here
///         Ok::<_, ClassifiedError>(vec!["a", "b"])
///     })
///     .await?;
///
/// service.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Resilience {
    config: ResilienceConfig,
    registry: CircuitBreakerRegistry,
    tracker: ErrorTracker,
}

impl std::fmt::Debug for Resilience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resilience")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Resilience {
    /// Build the service from a validated config, with no external sinks.
    pub fn new(config: ResilienceConfig) -> FailguardResult<Self> {
        config.validate()?;
        let tracker = ErrorTracker::new(config.tracker.clone());
        Ok(Self::assemble(config, tracker))
    }

    /// Build the service with persistence and alerting sinks wired into the
    /// tracker.
    pub fn with_sinks(
        config: ResilienceConfig,
        store: Arc<dyn ErrorStore>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> FailguardResult<Self> {
        config.validate()?;
        let tracker = ErrorTracker::with_sinks(config.tracker.clone(), store, notifier);
        Ok(Self::assemble(config, tracker))
    }

    fn assemble(config: ResilienceConfig, tracker: ErrorTracker) -> Self {
        let registry = CircuitBreakerRegistry::with_default_config(config.breaker.clone());
        Self {
            config,
            registry,
            tracker,
        }
    }

    /// Start the tracker's periodic evaluation tasks.
    pub async fn start(&self) {
        self.tracker.start().await;
    }

    /// Stop the tracker's periodic evaluation tasks.
    pub async fn stop(&self) {
        self.tracker.stop().await;
    }

    /// The error tracker, for direct ingestion and the read API.
    pub fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    /// The breaker registry, for stats and manual resets.
    pub fn registry(&self) -> &CircuitBreakerRegistry {
        &self.registry
    }

    /// Run an operation against a named dependency with the default retry
    /// policy.
    pub async fn run<F, Fut, T, E>(&self, dependency: &str, operation: F) -> FailguardResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        self.run_with_policy(dependency, self.config.retry.clone(), operation)
            .await
    }

    /// Run an operation against a named dependency with a per-call retry
    /// policy.
    ///
    /// The dependency's breaker admits (or fast-fails) the call; inside it
    /// the retry executor drives the operation. A terminal failure of any
    /// kind is handed to the tracker, stamped with the dependency as its
    /// component when the failure site did not set one.
    pub async fn run_with_policy<F, Fut, T, E>(
        &self,
        dependency: &str,
        policy: RetryPolicy,
        operation: F,
    ) -> FailguardResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ClassifiedError>,
    {
        let breaker = self.registry.get_or_create(dependency).await;
        let executor = RetryExecutor::new(policy);

        let result = breaker.execute(|| executor.execute(operation)).await;

        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                let mut record = ErrorRecord::from(&error);
                if record.component.is_none() {
                    record.component = Some(dependency.to_string());
                }
                log_error!(
                    dependency = dependency,
                    code = error.code(),
                    "Operation failed terminally"
                );
                self.tracker.track(record).await;
                Err(error)
            }
        }
    }

    /// Tracker config currently in effect (handy for read-side callers that
    /// want to mirror windows).
    pub fn tracker_config(&self) -> &TrackerConfig {
        self.tracker.config()
    }
}
