//! # Gateway Telemetry
//!
//! Observability for the gateway:
//! - Structured logging built on `tracing`
//! - A rolling in-memory collector of per-request metrics
//! - Prometheus export for scraping

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collector;
pub mod logging;
pub mod metrics;

pub use collector::{MetricsCollector, MetricsSummary, RequestMetric, ServiceMetrics};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{BreakerState, PrometheusMetrics};
