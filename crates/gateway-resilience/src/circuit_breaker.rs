//! Circuit breaker for upstream protection.
//!
//! Per-service state machine with three states:
//! - `Closed`: normal operation, calls pass through
//! - `Open`: upstream assumed down, calls fail fast
//! - `HalfOpen`: probing whether the upstream recovered
//!
//! The `Open` → `HalfOpen` transition is lazy: it happens on the next state
//! query after `open_timeout` has elapsed, not on a background timer. Every
//! call attempt queries the state, so the breaker never needs its own task.
//!
//! Successes in `Closed` decay the failure count by one (floored at zero)
//! instead of resetting it, so only a genuine failure streak can trip the
//! breaker while one isolated failure cannot skew behavior forever.

use chrono::{DateTime, Utc};
use gateway_core::GatewayError;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Failing fast, no upstream calls attempted
    Open,
    /// Probing recovery
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (within `monitor_window`) before opening
    pub failure_threshold: u32,
    /// Consecutive successes in half-open before closing
    pub success_threshold: u32,
    /// How long the breaker stays open before allowing a probe
    pub open_timeout: Duration,
    /// Failures further apart than this restart the streak
    pub monitor_window: Duration,
    /// Timeout applied around operations run through [`CircuitBreaker::execute`]
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            monitor_window: Duration::from_secs(120),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    /// Current state (after the lazy open-timeout check)
    pub state: CircuitState,
    /// Current failure count
    pub failure_count: u32,
    /// Current success count (meaningful in half-open)
    pub success_count: u32,
    /// Wall-clock time of the most recent failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Circuit breaker for a single logical service
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                last_failure_at: None,
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Service name this breaker protects
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Breaker configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state.
    ///
    /// Performs the lazy `Open` → `HalfOpen` transition when `open_timeout`
    /// has elapsed since the last failure.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_open_timeout(&mut inner);
        inner.state
    }

    /// Check whether a call may proceed
    ///
    /// # Errors
    /// Returns `GatewayError::CircuitOpen` while the breaker is open.
    pub fn try_acquire(&self) -> Result<(), GatewayError> {
        match self.state() {
            CircuitState::Open => Err(GatewayError::circuit_open(&self.name)),
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Run an operation through the breaker.
    ///
    /// Applies `call_timeout` around the operation, records the outcome and
    /// propagates the original error; the breaker never swallows failures,
    /// it only gates whether the call was attempted.
    ///
    /// # Errors
    /// Returns `GatewayError::CircuitOpen` without running the operation when
    /// open, `GatewayError::Timeout` when the operation exceeds the timeout,
    /// or the operation's own error.
    pub async fn execute<F, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        self.try_acquire()?;

        match tokio::time::timeout(self.config.call_timeout, operation).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(err)
            }
            Err(_) => {
                self.record_failure();
                warn!(
                    service = %self.name,
                    timeout_ms = self.config.call_timeout.as_millis(),
                    "Breaker call timed out"
                );
                Err(GatewayError::timeout(self.config.call_timeout))
            }
        }
    }

    /// Record a successful outcome.
    ///
    /// Direct hook for callers that observe outcomes outside [`execute`],
    /// e.g. a proxy path that classifies upstream statuses itself.
    ///
    /// [`execute`]: CircuitBreaker::execute
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.check_open_timeout(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                // Decay, not reset.
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!(service = %self.name, "Circuit breaker closed after recovery");
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            // No call should have been attempted while open; a straggling
            // success observation carries no signal.
            CircuitState::Open => {}
        }
    }

    /// Record a failed outcome (direct hook, see [`record_success`]).
    ///
    /// [`record_success`]: CircuitBreaker::record_success
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        self.check_open_timeout(&mut inner);

        let now = Instant::now();
        match inner.state {
            CircuitState::Closed => {
                let within_window = inner
                    .last_failure
                    .is_some_and(|at| now.duration_since(at) <= self.config.monitor_window);
                inner.failure_count = if within_window {
                    inner.failure_count + 1
                } else {
                    1
                };

                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        service = %self.name,
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.success_count = 0;
                }
            }
            CircuitState::HalfOpen => {
                warn!(service = %self.name, "Probe failed, circuit breaker re-opened");
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.failure_count += 1;
            }
            CircuitState::Open => {}
        }
        inner.last_failure = Some(now);
        inner.last_failure_at = Some(Utc::now());
    }

    /// Force the breaker closed with zeroed counters (operational override)
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        info!(service = %self.name, "Circuit breaker reset");
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
        inner.last_failure_at = None;
    }

    /// Observable snapshot (performs the lazy open-timeout check)
    #[must_use]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let mut inner = self.inner.lock();
        self.check_open_timeout(&mut inner);
        CircuitBreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
        }
    }

    fn check_open_timeout(&self, inner: &mut BreakerInner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let expired = inner
            .last_failure
            .is_some_and(|at| at.elapsed() >= self.config.open_timeout);
        if expired {
            debug!(service = %self.name, "Open timeout elapsed, probing recovery");
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_millis(50),
            monitor_window: Duration::from_secs(60),
            call_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_opens_after_failure_threshold() {
        let cb = CircuitBreaker::new("carts", test_config());
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_decays_failure_count() {
        let cb = CircuitBreaker::new("carts", test_config());

        cb.record_failure();
        cb.record_failure();
        cb.record_success(); // failure_count back to 1
        cb.record_failure(); // 2, still below threshold
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let cb = CircuitBreaker::new("carts", test_config());
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn test_lazy_half_open_transition() {
        let cb = CircuitBreaker::new("carts", test_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        // Immediately after opening the state query must not probe.
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(60));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_streak_closes() {
        let cb = CircuitBreaker::new("carts", test_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        sleep(Duration::from_millis(60));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 1);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 0);
    }

    #[test]
    fn test_half_open_failure_reopens_and_resets_progress() {
        let cb = CircuitBreaker::new("carts", test_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        sleep(Duration::from_millis(60));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().success_count, 0);
    }

    #[test]
    fn test_stale_failures_restart_streak() {
        let config = CircuitBreakerConfig {
            monitor_window: Duration::from_millis(20),
            ..test_config()
        };
        let cb = CircuitBreaker::new("carts", config);

        cb.record_failure();
        cb.record_failure();
        sleep(Duration::from_millis(30));
        // Outside the window: streak restarts at 1 rather than reaching 3.
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[test]
    fn test_reset_forces_closed() {
        let cb = CircuitBreaker::new("carts", test_config());
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert!(snapshot.last_failure_at.is_none());
    }

    #[tokio::test]
    async fn test_execute_success() {
        let cb = CircuitBreaker::new("carts", test_config());
        let result = cb.execute(async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_execute_propagates_error_and_counts_failure() {
        let cb = CircuitBreaker::new("carts", test_config());
        let result: Result<(), _> = cb
            .execute(async { Err(GatewayError::upstream("carts", 500)) })
            .await;
        assert!(matches!(result, Err(GatewayError::Upstream { .. })));
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_execute_timeout_counts_failure() {
        let cb = CircuitBreaker::new("carts", test_config());
        let result: Result<(), _> = cb
            .execute(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_execute_rejects_while_open() {
        let cb = CircuitBreaker::new("carts", test_config());
        for _ in 0..3 {
            cb.record_failure();
        }

        let result: Result<(), _> = cb
            .execute(async { panic!("must not run while open") })
            .await;
        assert!(matches!(result, Err(GatewayError::CircuitOpen { .. })));
    }

    #[test]
    fn test_scenario_full_cycle() {
        // failure_threshold=3, success_threshold=2: trip, wait, probe, fail.
        let cb = CircuitBreaker::new("orders", test_config());

        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.state(), CircuitState::Open);

        sleep(Duration::from_millis(60));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 1);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.snapshot().success_count, 0);
    }
}
