//! Shared application state.

use crate::auth::{DenyAllVerifier, RemoteTokenVerifier, StaticTokenVerifier};
use arc_swap::ArcSwap;
use gateway_config::GatewayConfig;
use gateway_core::{GatewayError, TokenVerifier};
use gateway_health::{HealthMonitor, HealthMonitorConfig};
use gateway_resilience::{
    CacheConfig, CircuitBreakerConfig, CircuitBreakerRegistry, ResponseCache,
};
use gateway_routing::RoutingTable;
use gateway_telemetry::{MetricsCollector, PrometheusMetrics};
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Configuration, swappable without restart
    pub config: Arc<ArcSwap<GatewayConfig>>,
    /// Routing table, rebuilt on config swap
    pub routes: Arc<ArcSwap<RoutingTable>>,
    /// Per-service circuit breakers
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Upstream health monitor
    pub health: Arc<HealthMonitor>,
    /// Response cache
    pub cache: Arc<ResponseCache>,
    /// Rolling request metrics
    pub collector: Arc<MetricsCollector>,
    /// Prometheus export
    pub prometheus: Arc<PrometheusMetrics>,
    /// Token verifier
    pub verifier: Arc<dyn TokenVerifier>,
    /// Shared outbound HTTP client
    pub client: reqwest::Client,
}

impl AppState {
    /// Start building state from configuration
    #[must_use]
    pub fn builder(config: GatewayConfig) -> AppStateBuilder {
        AppStateBuilder {
            config,
            verifier: None,
        }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    /// Current routing table
    #[must_use]
    pub fn routes(&self) -> Arc<RoutingTable> {
        self.routes.load_full()
    }

    /// Swap in a new configuration and rebuild the routing table
    pub fn update_config(&self, config: GatewayConfig) {
        self.routes
            .store(Arc::new(RoutingTable::new(config.routes.clone())));
        self.config.store(Arc::new(config));
    }
}

/// Builder for [`AppState`]
pub struct AppStateBuilder {
    config: GatewayConfig,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AppStateBuilder {
    /// Override the verifier (tests, embedding)
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns an error when an HTTP client cannot be constructed or the
    /// Prometheus collectors cannot be registered. Client construction is
    /// never allowed to fall back to an unbounded default: every outbound
    /// call carries a timeout or the gateway does not start.
    pub fn build(self) -> Result<AppState, GatewayError> {
        let config = self.config;

        let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: config.resilience.failure_threshold,
            success_threshold: config.resilience.success_threshold,
            open_timeout: config.resilience.open_timeout,
            monitor_window: config.resilience.monitor_window,
            call_timeout: config.server.request_timeout,
        });

        let cache = ResponseCache::new(CacheConfig {
            enabled: config.cache.enabled,
            default_ttl: config.cache.default_ttl,
            sweep_interval: config.cache.sweep_interval,
            max_entries: config.cache.max_entries,
        });

        let health = HealthMonitor::new(HealthMonitorConfig {
            check_interval: config.health.check_interval,
            probe_timeout: config.health.probe_timeout,
        })
        .map_err(|e| {
            GatewayError::configuration(format!("failed to build health probe client: {e}"))
        })?;

        let verifier: Arc<dyn TokenVerifier> = match self.verifier {
            Some(verifier) => verifier,
            None => {
                if let Some(url) = &config.auth.verify_url {
                    Arc::new(
                        RemoteTokenVerifier::new(url.clone(), config.auth.verify_timeout)
                            .map_err(|e| {
                                GatewayError::configuration(format!(
                                    "failed to build token verification client: {e}"
                                ))
                            })?,
                    )
                } else if !config.auth.static_tokens.is_empty() {
                    Arc::new(StaticTokenVerifier::new(config.auth.static_tokens.clone()))
                } else {
                    Arc::new(DenyAllVerifier)
                }
            }
        };

        let client = reqwest::Client::builder()
            .timeout(config.server.request_timeout)
            .build()
            .map_err(|e| {
                GatewayError::configuration(format!("failed to build upstream HTTP client: {e}"))
            })?;

        Ok(AppState {
            routes: Arc::new(ArcSwap::new(Arc::new(RoutingTable::new(
                config.routes.clone(),
            )))),
            config: Arc::new(ArcSwap::new(Arc::new(config))),
            breakers: Arc::new(breakers),
            health: Arc::new(health),
            cache: Arc::new(cache),
            collector: Arc::new(MetricsCollector::new()),
            prometheus: Arc::new(PrometheusMetrics::new().map_err(|e| {
                GatewayError::internal(format!("failed to register metrics collectors: {e}"))
            })?),
            verifier,
            client,
        })
    }
}
