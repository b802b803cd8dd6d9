//! Named circuit breaker registry.
//!
//! Multiple call sites that talk to the same logical dependency must share
//! one breaker, otherwise each site keeps its own failure counts and the
//! circuit never opens. The registry is an explicitly constructed service
//! passed by reference to call sites; there is no process-global instance.

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use crate::logging::log_debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lazily-populated name → breaker mapping, safe under concurrent
/// registration.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers default to
    /// [`CircuitBreakerConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with a default config applied to new breakers.
    pub fn with_default_config(config: CircuitBreakerConfig) -> Self {
        Self {
            default_config: config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Return the breaker for `name`, creating it with the registry default
    /// config on first lookup.
    pub async fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, self.default_config.clone())
            .await
    }

    /// Return the breaker for `name`, creating it with `config` on first
    /// lookup.
    ///
    /// The config is honored only at creation: later calls with a different
    /// config for the same name return the existing breaker unchanged.
    pub async fn get_or_create_with(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().await;
        // Racing creators resolve here: the second writer finds the entry.
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            log_debug!(breaker = name, "Registering circuit breaker");
            Arc::new(CircuitBreaker::new(name, config))
        }))
    }

    /// Return the breaker for `name` if one has been created.
    pub async fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().await.get(name).map(Arc::clone)
    }

    /// Snapshot stats for every registered breaker.
    pub async fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().map(Arc::clone).collect();

        let mut stats = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            stats.push(breaker.stats().await);
        }
        stats
    }

    /// Reset every registered breaker to Closed with zeroed counters.
    pub async fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.read().await.values().map(Arc::clone).collect();

        for breaker in breakers {
            breaker.reset().await;
        }
    }

    /// Number of registered breakers.
    pub async fn len(&self) -> usize {
        self.breakers.read().await.len()
    }

    /// Whether no breakers have been registered yet.
    pub async fn is_empty(&self) -> bool {
        self.breakers.read().await.is_empty()
    }
}
