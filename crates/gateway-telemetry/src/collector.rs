//! Rolling in-memory request metrics.
//!
//! The collector keeps the most recent requests in a fixed-size ring and
//! per-service aggregates alongside. Aggregates are cumulative since startup
//! except the moving average, which covers each service's last 100 requests
//! so a recovering upstream is not dragged down by old latencies forever.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Ring capacity: oldest entries fall off past this many requests.
const RING_CAPACITY: usize = 10_000;

/// Window of recent requests the summary aggregates over.
const SUMMARY_WINDOW: usize = 1_000;

/// Per-service window for the moving response-time average.
const MOVING_AVG_WINDOW: usize = 100;

/// One completed request
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetric {
    /// HTTP method
    pub method: String,
    /// Request path as received by the gateway
    pub path: String,
    /// Response status sent to the caller
    pub status: u16,
    /// End-to-end duration in milliseconds
    pub duration_ms: u64,
    /// Logical service that handled the request
    pub service: String,
    /// Completion time
    pub timestamp: DateTime<Utc>,
}

impl RequestMetric {
    /// Record-style constructor stamping the current time
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        status: u16,
        duration_ms: u64,
        service: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status,
            duration_ms,
            service: service.into(),
            timestamp: Utc::now(),
        }
    }

    fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Cumulative aggregates for one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetrics {
    /// Requests handled
    pub total_requests: u64,
    /// Requests with a status below 400
    pub successful_requests: u64,
    /// Requests with a status of 400 or above
    pub failed_requests: u64,
    /// Fastest observed response
    pub min_response_time_ms: u64,
    /// Slowest observed response
    pub max_response_time_ms: u64,
    /// Moving average over the service's last 100 requests
    pub avg_response_time_ms: f64,
    /// Error counts keyed by status code
    pub errors_by_status: HashMap<u16, u64>,
}

#[derive(Debug, Default)]
struct ServiceState {
    total: u64,
    successful: u64,
    failed: u64,
    min_ms: Option<u64>,
    max_ms: u64,
    errors_by_status: HashMap<u16, u64>,
    recent_durations: VecDeque<u64>,
}

impl ServiceState {
    fn record(&mut self, metric: &RequestMetric) {
        self.total += 1;
        if metric.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
            *self.errors_by_status.entry(metric.status).or_default() += 1;
        }

        self.min_ms = Some(match self.min_ms {
            Some(min) => min.min(metric.duration_ms),
            None => metric.duration_ms,
        });
        self.max_ms = self.max_ms.max(metric.duration_ms);

        if self.recent_durations.len() == MOVING_AVG_WINDOW {
            self.recent_durations.pop_front();
        }
        self.recent_durations.push_back(metric.duration_ms);
    }

    fn snapshot(&self) -> ServiceMetrics {
        let avg = if self.recent_durations.is_empty() {
            0.0
        } else {
            self.recent_durations.iter().sum::<u64>() as f64 / self.recent_durations.len() as f64
        };
        ServiceMetrics {
            total_requests: self.total,
            successful_requests: self.successful,
            failed_requests: self.failed,
            min_response_time_ms: self.min_ms.unwrap_or(0),
            max_response_time_ms: self.max_ms,
            avg_response_time_ms: avg,
            errors_by_status: self.errors_by_status.clone(),
        }
    }
}

/// Summary over the most recent requests across all services
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    /// Requests in the summary window
    pub total_requests: u64,
    /// Percentage of windowed requests with a status below 400
    pub success_rate_pct: f64,
    /// Mean duration over the window
    pub avg_response_time_ms: f64,
    /// Windowed request counts per service
    pub requests_by_service: HashMap<String, u64>,
}

#[derive(Default)]
struct CollectorInner {
    ring: VecDeque<RequestMetric>,
    services: HashMap<String, ServiceState>,
}

/// Rolling request metrics collector
#[derive(Default)]
pub struct MetricsCollector {
    inner: RwLock<CollectorInner>,
}

impl MetricsCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record(&self, metric: RequestMetric) {
        let mut inner = self.inner.write();
        inner
            .services
            .entry(metric.service.clone())
            .or_default()
            .record(&metric);

        if inner.ring.len() == RING_CAPACITY {
            inner.ring.pop_front();
        }
        inner.ring.push_back(metric);
    }

    /// Aggregates for one service, if it has handled any requests
    #[must_use]
    pub fn service_metrics(&self, service: &str) -> Option<ServiceMetrics> {
        self.inner
            .read()
            .services
            .get(service)
            .map(ServiceState::snapshot)
    }

    /// Aggregates for every service
    #[must_use]
    pub fn all_metrics(&self) -> HashMap<String, ServiceMetrics> {
        self.inner
            .read()
            .services
            .iter()
            .map(|(name, state)| (name.clone(), state.snapshot()))
            .collect()
    }

    /// Summary over the last 1000 requests
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let inner = self.inner.read();
        let window_start = inner.ring.len().saturating_sub(SUMMARY_WINDOW);
        let window = inner.ring.iter().skip(window_start);

        let mut total = 0u64;
        let mut successes = 0u64;
        let mut duration_sum = 0u64;
        let mut by_service: HashMap<String, u64> = HashMap::new();
        for metric in window {
            total += 1;
            if metric.is_success() {
                successes += 1;
            }
            duration_sum += metric.duration_ms;
            *by_service.entry(metric.service.clone()).or_default() += 1;
        }

        MetricsSummary {
            total_requests: total,
            success_rate_pct: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64 * 100.0
            },
            avg_response_time_ms: if total == 0 {
                0.0
            } else {
                duration_sum as f64 / total as f64
            },
            requests_by_service: by_service,
        }
    }

    /// Recent raw entries, newest last, at most `limit`
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<RequestMetric> {
        let inner = self.inner.read();
        let start = inner.ring.len().saturating_sub(limit);
        inner.ring.iter().skip(start).cloned().collect()
    }

    /// Drop all recorded data
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.ring.clear();
        inner.services.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(service: &str, status: u16, duration_ms: u64) -> RequestMetric {
        RequestMetric::new("GET", "/catalogue", status, duration_ms, service)
    }

    #[test]
    fn test_success_and_failure_aggregates() {
        let collector = MetricsCollector::new();
        collector.record(metric("catalogue", 200, 40));
        collector.record(metric("catalogue", 500, 120));

        let m = collector.service_metrics("catalogue").unwrap();
        assert_eq!(m.total_requests, 2);
        assert_eq!(m.successful_requests, 1);
        assert_eq!(m.failed_requests, 1);
        assert_eq!(m.min_response_time_ms, 40);
        assert_eq!(m.max_response_time_ms, 120);
        assert!((m.avg_response_time_ms - 80.0).abs() < f64::EPSILON);
        assert_eq!(m.errors_by_status.get(&500), Some(&1));

        let summary = collector.summary();
        assert_eq!(summary.total_requests, 2);
        assert!((summary.success_rate_pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_client_errors_count_as_failures() {
        let collector = MetricsCollector::new();
        collector.record(metric("orders", 404, 10));

        let m = collector.service_metrics("orders").unwrap();
        assert_eq!(m.failed_requests, 1);
        assert_eq!(m.errors_by_status.get(&404), Some(&1));
    }

    #[test]
    fn test_moving_average_window() {
        let collector = MetricsCollector::new();
        // 100 slow requests, then 100 fast ones: the average must reflect
        // only the fast window.
        for _ in 0..100 {
            collector.record(metric("carts", 200, 1000));
        }
        for _ in 0..100 {
            collector.record(metric("carts", 200, 10));
        }

        let m = collector.service_metrics("carts").unwrap();
        assert_eq!(m.total_requests, 200);
        assert!((m.avg_response_time_ms - 10.0).abs() < f64::EPSILON);
        assert_eq!(m.max_response_time_ms, 1000);
    }

    #[test]
    fn test_ring_capacity_bounds_memory() {
        let collector = MetricsCollector::new();
        for i in 0..(RING_CAPACITY + 50) {
            collector.record(metric("carts", 200, i as u64));
        }
        assert_eq!(collector.inner.read().ring.len(), RING_CAPACITY);
        // Cumulative totals are unaffected by ring eviction.
        assert_eq!(
            collector.service_metrics("carts").unwrap().total_requests,
            (RING_CAPACITY + 50) as u64
        );
    }

    #[test]
    fn test_summary_covers_last_thousand() {
        let collector = MetricsCollector::new();
        for _ in 0..500 {
            collector.record(metric("old-service", 500, 5));
        }
        for _ in 0..1000 {
            collector.record(metric("carts", 200, 5));
        }

        let summary = collector.summary();
        assert_eq!(summary.total_requests, 1000);
        assert!((summary.success_rate_pct - 100.0).abs() < f64::EPSILON);
        assert!(!summary.requests_by_service.contains_key("old-service"));
    }

    #[test]
    fn test_unknown_service_and_empty_summary() {
        let collector = MetricsCollector::new();
        assert!(collector.service_metrics("nope").is_none());
        let summary = collector.summary();
        assert_eq!(summary.total_requests, 0);
        assert!((summary.success_rate_pct).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.record(metric("carts", 200, 10));
        collector.reset();
        assert!(collector.service_metrics("carts").is_none());
        assert_eq!(collector.summary().total_requests, 0);
    }
}
