//! Configuration schema.
//!
//! All sections default sensibly so a minimal file only needs `routes`.
//! Durations deserialize from humantime strings (`30s`, `1m`).

use gateway_core::AuthClaims;
use gateway_routing::RouteRule;
use gateway_telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    #[validate(nested)]
    pub server: ServerConfig,

    /// Upstream services monitored for health. When empty, targets are
    /// derived from the route table.
    #[validate(nested)]
    pub services: Vec<ServiceConfig>,

    /// Route rules, matched longest-prefix-first
    pub routes: Vec<RouteRule>,

    /// Circuit breaker settings
    pub resilience: ResilienceSettings,

    /// Response cache settings
    pub cache: CacheSettings,

    /// Health monitor settings
    pub health: HealthSettings,

    /// Token verification settings
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns the accumulated validation errors.
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()
    }

    /// `(service, base_url)` pairs the health monitor should probe.
    ///
    /// Explicit `services` entries win; otherwise one target per distinct
    /// route service, using the first route's upstream.
    #[must_use]
    pub fn health_targets(&self) -> Vec<(String, String)> {
        if !self.services.is_empty() {
            return self
                .services
                .iter()
                .map(|s| (s.name.clone(), s.base_url.clone()))
                .collect();
        }

        let mut seen = Vec::new();
        let mut targets = Vec::new();
        for route in &self.routes {
            if !seen.contains(&route.service) {
                seen.push(route.service.clone());
                targets.push((route.service.clone(), route.upstream.clone()));
            }
        }
        targets
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Per-request timeout applied to upstream calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// An upstream service to monitor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Logical service name
    #[validate(length(min = 1))]
    pub name: String,

    /// Base URL, probed at `{base_url}/health`
    #[validate(url)]
    pub base_url: String,
}

/// Circuit breaker settings applied to every service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Failures within the monitor window before opening
    pub failure_threshold: u32,
    /// Half-open successes before closing
    pub success_threshold: u32,
    /// Open duration before a probe is allowed
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
    /// Failures further apart than this restart the streak
    #[serde(with = "humantime_serde")]
    pub monitor_window: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(60),
            monitor_window: Duration::from_secs(120),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Master switch
    pub enabled: bool,
    /// TTL for routes without their own
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Background sweep interval
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Maximum cached entries
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            max_entries: 10_000,
        }
    }
}

/// Health monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Interval between probe rounds
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Timeout per probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Token verification settings.
///
/// When `verify_url` is set, tokens are verified against that endpoint;
/// otherwise the static token map is used. With neither configured, routes
/// requiring authentication reject every request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    /// Remote verification endpoint (POSTed the bearer token)
    #[validate(url)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,

    /// Static token-to-claims map, for development and tests
    pub static_tokens: HashMap<String, AuthClaims>,

    /// Timeout for remote verification calls
    #[serde(with = "humantime_serde")]
    pub verify_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verify_url: None,
            static_tokens: HashMap::new(),
            verify_timeout: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    /// Whether any verification backend is configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.verify_url.is_some() || !self.static_tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_routing::AuthPolicy;

    #[test]
    fn test_minimal_yaml_parses_with_defaults() {
        let yaml = r#"
routes:
  - prefix: /catalogue
    service: catalogue
    upstream: http://catalogue:8080
    cacheable: true
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].auth, AuthPolicy::Never);
        assert!(config.routes[0].cacheable);
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = r#"
resilience:
  failure_threshold: 3
  open_timeout: 1m
cache:
  default_ttl: 45s
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resilience.failure_threshold, 3);
        assert_eq!(config.resilience.open_timeout, Duration::from_secs(60));
        assert_eq!(config.cache.default_ttl, Duration::from_secs(45));
        // Untouched sections keep their defaults.
        assert_eq!(config.resilience.success_threshold, 2);
    }

    #[test]
    fn test_health_targets_derived_from_routes() {
        let yaml = r#"
routes:
  - prefix: /carts
    service: carts
    upstream: http://carts:8080
  - prefix: /carts/items
    service: carts
    upstream: http://carts:8080
  - prefix: /orders
    service: orders
    upstream: http://orders:8080
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        let targets = config.health_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].0, "carts");
        assert_eq!(targets[1].0, "orders");
    }

    #[test]
    fn test_explicit_services_win() {
        let yaml = r#"
services:
  - name: payments
    base_url: http://payments:8080
routes:
  - prefix: /carts
    service: carts
    upstream: http://carts:8080
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        let targets = config.health_targets();
        assert_eq!(targets, vec![("payments".to_string(), "http://payments:8080".to_string())]);
    }

    #[test]
    fn test_invalid_service_url_rejected() {
        let yaml = r#"
services:
  - name: carts
    base_url: not-a-url
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_static_tokens_parse_claims() {
        let yaml = r#"
auth:
  static_tokens:
    dev-token:
      user_id: u-1
      roles: [customer]
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.auth.is_configured());
        let claims = config.auth.static_tokens.get("dev-token").unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert!(claims.has_role("customer"));
    }
}
