//! Upstream health monitor.
//!
//! Each registered service is probed on a fixed interval by issuing
//! `GET {base_url}/health`. A service counts as healthy when the probe
//! reaches it (status below 500) and, if the body is a JSON object with a
//! boolean `success` field, that field is `true`.
//!
//! Before the first probe completes the monitor answers optimistically:
//! an upstream is assumed healthy until observed otherwise, so the gateway
//! never fails fast on startup. Once probing starts, a verdict older than
//! twice the check interval is treated as unhealthy.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Interval between probe rounds
    pub check_interval: Duration,
    /// Timeout applied to each individual probe
    pub probe_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Last observed health of one service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    /// Service name
    pub name: String,
    /// Base URL being probed
    pub url: String,
    /// Verdict of the most recent probe (`true` before any probe ran)
    pub healthy: bool,
    /// When the most recent probe completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Probe round-trip time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Error from the most recent failed probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip)]
    last_checked: Option<Instant>,
}

impl ServiceHealth {
    fn new(name: String, url: String) -> Self {
        Self {
            name,
            url,
            healthy: true,
            last_checked_at: None,
            response_time_ms: None,
            last_error: None,
            last_checked: None,
        }
    }
}

struct ProbeOutcome {
    healthy: bool,
    response_time_ms: u64,
    error: Option<String>,
}

/// Background monitor probing upstream health endpoints
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    client: reqwest::Client,
    services: RwLock<HashMap<String, ServiceHealth>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor
    ///
    /// # Errors
    /// Returns an error when the probe HTTP client cannot be constructed;
    /// a monitor without its probe timeout must not come up.
    pub fn new(config: HealthMonitorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            services: RwLock::new(HashMap::new()),
            task: Mutex::new(None),
        })
    }

    /// Create with default configuration
    ///
    /// # Errors
    /// Returns an error when the probe HTTP client cannot be constructed.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(HealthMonitorConfig::default())
    }

    /// Register a service and probe it once immediately.
    ///
    /// The initial probe is best-effort; a failure is recorded and logged
    /// but registration always succeeds.
    pub async fn register_service(&self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        info!(service = %name, url = %url, "Registering service for health monitoring");

        self.services
            .write()
            .insert(name.clone(), ServiceHealth::new(name.clone(), url));
        self.check_service(&name).await;
    }

    /// Probe one service now and record the outcome
    pub async fn check_service(&self, name: &str) {
        let Some(url) = self
            .services
            .read()
            .get(name)
            .map(|s| s.url.clone())
        else {
            return;
        };

        let outcome = self.probe(&url).await;
        if let Some(err) = &outcome.error {
            warn!(service = %name, error = %err, "Health probe failed");
        } else {
            debug!(
                service = %name,
                healthy = outcome.healthy,
                elapsed_ms = outcome.response_time_ms,
                "Health probe completed"
            );
        }

        let mut services = self.services.write();
        if let Some(health) = services.get_mut(name) {
            health.healthy = outcome.healthy;
            health.response_time_ms = Some(outcome.response_time_ms);
            health.last_error = outcome.error;
            health.last_checked = Some(Instant::now());
            health.last_checked_at = Some(Utc::now());
        }
    }

    /// Probe every registered service concurrently
    pub async fn check_all(&self) {
        let names: Vec<String> = self.services.read().keys().cloned().collect();
        join_all(names.iter().map(|name| self.check_service(name))).await;
    }

    /// Current verdict for a service.
    ///
    /// Unknown or never-probed services are healthy (optimistic default);
    /// a verdict staler than twice the check interval is unhealthy.
    #[must_use]
    pub fn is_healthy(&self, name: &str) -> bool {
        let services = self.services.read();
        let Some(health) = services.get(name) else {
            return true;
        };
        match health.last_checked {
            None => true,
            Some(at) if at.elapsed() > self.config.check_interval * 2 => false,
            Some(_) => health.healthy,
        }
    }

    /// Snapshot of every service's health for status reporting
    #[must_use]
    pub fn all_health(&self) -> HashMap<String, ServiceHealth> {
        self.services.read().clone()
    }

    /// Start the periodic probe loop; idempotent
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.task.lock();
        if guard.is_some() {
            return;
        }

        info!(
            interval_s = self.config.check_interval.as_secs(),
            "Starting health monitor"
        );
        let monitor = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; services were already probed at
            // registration.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.check_all().await;
            }
        }));
    }

    /// Stop the probe loop
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("Health monitor stopped");
        }
    }

    async fn probe(&self, base_url: &str) -> ProbeOutcome {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        let started = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let status = response.status();
                // 4xx still means the service answered; only 5xx and
                // transport errors count against it.
                let mut healthy = status.as_u16() < 500;
                let mut error = None;

                if !healthy {
                    error = Some(format!("Health endpoint returned {status}"));
                } else if let Ok(body) = response.json::<serde_json::Value>().await {
                    if let Some(flag) = body.get("success").and_then(|v| v.as_bool()) {
                        healthy = flag;
                        if !flag {
                            error = Some("Health endpoint reported success=false".to_string());
                        }
                    }
                }

                ProbeOutcome {
                    healthy,
                    response_time_ms: elapsed,
                    error,
                }
            }
            Err(err) => ProbeOutcome {
                healthy: false,
                response_time_ms: started.elapsed().as_millis() as u64,
                error: Some(err.to_string()),
            },
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_is_healthy() {
        let monitor = HealthMonitor::with_defaults().unwrap();
        assert!(monitor.is_healthy("never-registered"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unhealthy_after_probe() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            check_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(200),
        })
        .unwrap();
        // Nothing listens on port 1; the registration probe must fail.
        monitor.register_service("carts", "http://127.0.0.1:1").await;

        assert!(!monitor.is_healthy("carts"));
        let health = monitor.all_health();
        let carts = health.get("carts").unwrap();
        assert!(!carts.healthy);
        assert!(carts.last_error.is_some());
        assert!(carts.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn test_stale_verdict_counts_as_unhealthy() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            check_interval: Duration::from_millis(10),
            probe_timeout: Duration::from_millis(200),
        })
        .unwrap();
        monitor.register_service("carts", "http://127.0.0.1:1").await;

        // Force the healthy flag so staleness alone drives the verdict.
        monitor.services.write().get_mut("carts").unwrap().healthy = true;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!monitor.is_healthy("carts"));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let monitor = Arc::new(HealthMonitor::with_defaults().unwrap());
        monitor.start();
        monitor.start();
        assert!(monitor.task.lock().is_some());
        monitor.stop();
        assert!(monitor.task.lock().is_none());
    }
}
