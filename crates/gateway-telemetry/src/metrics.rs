//! Prometheus export.
//!
//! Counters and gauges for scraping, kept separate from the rolling
//! collector: Prometheus gets monotonic series, the collector serves the
//! gateway's own status endpoint.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tracing::error;

/// Breaker state encoded for the state gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// 0: passing traffic
    Closed,
    /// 1: failing fast
    Open,
    /// 2: probing recovery
    HalfOpen,
}

/// Prometheus registry and collectors for the gateway
pub struct PrometheusMetrics {
    registry: Registry,
    requests_total: CounterVec,
    request_duration: HistogramVec,
    errors_total: CounterVec,
    circuit_breaker_state: GaugeVec,
    upstream_health: GaugeVec,
    cache_operations: CounterVec,
}

impl PrometheusMetrics {
    /// Create and register all collectors
    ///
    /// # Errors
    /// Returns an error when a collector cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("requests_total", "Requests handled by the gateway").namespace("gateway"),
            &["service", "method", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "End-to-end request latency")
                .namespace("gateway")
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ]),
            &["service"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Errors returned to callers").namespace("gateway"),
            &["service", "error_type"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Breaker state (0=closed, 1=open, 2=half-open)",
            )
            .namespace("gateway"),
            &["service"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let upstream_health = GaugeVec::new(
            Opts::new("upstream_health", "Upstream health (1=healthy)").namespace("gateway"),
            &["service"],
        )?;
        registry.register(Box::new(upstream_health.clone()))?;

        let cache_operations = CounterVec::new(
            Opts::new("cache_operations_total", "Response cache lookups").namespace("gateway"),
            &["result"],
        )?;
        registry.register(Box::new(cache_operations.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            errors_total,
            circuit_breaker_state,
            upstream_health,
            cache_operations,
        })
    }

    /// Record a completed request
    pub fn record_request(&self, service: &str, method: &str, status: u16, duration: Duration) {
        self.requests_total
            .with_label_values(&[service, method, &status.to_string()])
            .inc();
        self.request_duration
            .with_label_values(&[service])
            .observe(duration.as_secs_f64());
    }

    /// Record an error by type label
    pub fn record_error(&self, service: &str, error_type: &str) {
        self.errors_total
            .with_label_values(&[service, error_type])
            .inc();
    }

    /// Update a service's breaker state gauge
    pub fn set_breaker_state(&self, service: &str, state: BreakerState) {
        let value = match state {
            BreakerState::Closed => 0.0,
            BreakerState::Open => 1.0,
            BreakerState::HalfOpen => 2.0,
        };
        self.circuit_breaker_state
            .with_label_values(&[service])
            .set(value);
    }

    /// Update a service's health gauge
    pub fn set_upstream_health(&self, service: &str, healthy: bool) {
        self.upstream_health
            .with_label_values(&[service])
            .set(if healthy { 1.0 } else { 0.0 });
    }

    /// Record a cache lookup outcome
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_operations.with_label_values(&[result]).inc();
    }

    /// Encode all collectors as Prometheus text format
    #[must_use]
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Underlying registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_appears_in_output() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_request("carts", "GET", 200, Duration::from_millis(25));

        let output = metrics.gather();
        assert!(output.contains("gateway_requests_total"));
        assert!(output.contains("carts"));
        assert!(output.contains("# HELP"));
    }

    #[test]
    fn test_breaker_and_health_gauges() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.set_breaker_state("orders", BreakerState::Open);
        metrics.set_upstream_health("orders", false);

        let output = metrics.gather();
        assert!(output.contains("gateway_circuit_breaker_state"));
        assert!(output.contains("gateway_upstream_health"));
    }

    #[test]
    fn test_cache_lookup_labels() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);

        let output = metrics.gather();
        assert!(output.contains("result=\"hit\""));
        assert!(output.contains("result=\"miss\""));
    }
}
