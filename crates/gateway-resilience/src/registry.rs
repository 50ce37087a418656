//! Per-service circuit breaker registry.
//!
//! One breaker per logical service name, created on first use. The registry
//! hands out `Arc`s so the dispatcher, status endpoints and admin operations
//! all observe the same breaker instance.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of circuit breakers keyed by service name
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry; `default_config` applies to breakers created lazily
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a service, creating it with the default
    /// configuration on first use
    pub fn get_or_create(&self, service: &str) -> Arc<CircuitBreaker> {
        // Fast path: reader lock only.
        {
            let breakers = self.breakers.read();
            if let Some(breaker) = breakers.get(service) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write();
        // Re-check: another writer may have won the race.
        if let Some(breaker) = breakers.get(service) {
            return Arc::clone(breaker);
        }

        debug!(service = %service, "Creating circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(service, self.default_config.clone()));
        breakers.insert(service.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Register a breaker with a service-specific configuration, replacing
    /// any existing breaker for that service
    pub fn register(&self, service: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::new(service, config));
        self.breakers
            .write()
            .insert(service.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Get an existing breaker without creating one
    #[must_use]
    pub fn get(&self, service: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(service).map(Arc::clone)
    }

    /// Reset one breaker; returns `false` when the service is unknown
    pub fn reset(&self, service: &str) -> bool {
        match self.get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every registered breaker
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    /// Snapshot all breakers for status reporting
    #[must_use]
    pub fn snapshots(&self) -> HashMap<String, CircuitBreakerSnapshot> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect()
    }

    /// Number of registered breakers
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("carts");
        let b = registry.get_or_create("carts");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_breakers_are_independent() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });

        registry.get_or_create("carts").record_failure();
        assert_eq!(registry.get_or_create("carts").state(), CircuitState::Open);
        assert_eq!(
            registry.get_or_create("orders").state(),
            CircuitState::Closed
        );
    }

    #[test]
    fn test_register_overrides_config() {
        let registry = CircuitBreakerRegistry::default();
        let breaker = registry.register(
            "payments",
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
        );
        breaker.record_failure();
        assert_eq!(registry.get("payments").unwrap().state(), CircuitState::Open);
    }

    #[test]
    fn test_reset_unknown_service() {
        let registry = CircuitBreakerRegistry::default();
        assert!(!registry.reset("nope"));
    }

    #[test]
    fn test_reset_all() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        registry.get_or_create("carts").record_failure();
        registry.get_or_create("orders").record_failure();

        registry.reset_all();
        let snapshots = registry.snapshots();
        assert!(snapshots
            .values()
            .all(|s| s.state == CircuitState::Closed && s.failure_count == 0));
    }
}
