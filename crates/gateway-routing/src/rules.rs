//! Route rule definitions.
//!
//! A rule binds a path prefix to an upstream service and carries the
//! per-route policy the dispatcher applies: authentication requirements,
//! cacheability and the cache patterns a successful write invalidates.

use http::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a route requires an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Every request must carry a valid token
    Always,
    /// Requests are served anonymously
    #[default]
    Never,
    /// Only mutating methods require a token; safe methods pass through
    MutatingOnly,
}

impl AuthPolicy {
    /// Whether a request with this method must be authenticated
    #[must_use]
    pub fn requires_auth(&self, method: &Method) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::MutatingOnly => !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS),
        }
    }
}

/// A single routing rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    /// Path prefix this rule matches (e.g. `/carts`)
    pub prefix: String,
    /// Logical service name, used for breakers, health and metrics
    pub service: String,
    /// Upstream base URL requests are forwarded to
    pub upstream: String,
    /// Replacement for the matched prefix on the upstream path; `None`
    /// forwards the path unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_prefix: Option<String>,
    /// Authentication policy for this route
    #[serde(default)]
    pub auth: AuthPolicy,
    /// Whether successful GET responses may be cached
    #[serde(default)]
    pub cacheable: bool,
    /// Per-route cache TTL; falls back to the cache default when absent
    #[serde(
        default,
        with = "humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_ttl: Option<Duration>,
    /// Cache key globs to invalidate after a successful mutating request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate_on_write: Vec<String>,
}

impl RouteRule {
    /// Create a rule forwarding `prefix` to `upstream` under `service`
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        service: impl Into<String>,
        upstream: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
            upstream: upstream.into(),
            rewrite_prefix: None,
            auth: AuthPolicy::Never,
            cacheable: false,
            cache_ttl: None,
            invalidate_on_write: Vec::new(),
        }
    }

    /// Set the authentication policy
    #[must_use]
    pub fn with_auth(mut self, auth: AuthPolicy) -> Self {
        self.auth = auth;
        self
    }

    /// Rewrite the matched prefix before forwarding
    #[must_use]
    pub fn with_rewrite(mut self, rewrite_prefix: impl Into<String>) -> Self {
        self.rewrite_prefix = Some(rewrite_prefix.into());
        self
    }

    /// Mark GET responses on this route cacheable
    #[must_use]
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Set a per-route cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Add a cache glob invalidated by successful writes on this route
    #[must_use]
    pub fn invalidating(mut self, pattern: impl Into<String>) -> Self {
        self.invalidate_on_write.push(pattern.into());
        self
    }

    /// Path forwarded to the upstream, with the prefix rewritten when
    /// configured
    #[must_use]
    pub fn upstream_path(&self, path: &str) -> String {
        match &self.rewrite_prefix {
            Some(replacement) => {
                let rest = path.strip_prefix(&self.prefix).unwrap_or(path);
                format!("{}{}", replacement.trim_end_matches('/'), rest)
            }
            None => path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_policy_mutating_only() {
        let policy = AuthPolicy::MutatingOnly;
        assert!(!policy.requires_auth(&Method::GET));
        assert!(!policy.requires_auth(&Method::HEAD));
        assert!(!policy.requires_auth(&Method::OPTIONS));
        assert!(policy.requires_auth(&Method::POST));
        assert!(policy.requires_auth(&Method::PUT));
        assert!(policy.requires_auth(&Method::DELETE));
        assert!(policy.requires_auth(&Method::PATCH));
    }

    #[test]
    fn test_auth_policy_always_and_never() {
        assert!(AuthPolicy::Always.requires_auth(&Method::GET));
        assert!(!AuthPolicy::Never.requires_auth(&Method::DELETE));
    }

    #[test]
    fn test_upstream_path_without_rewrite() {
        let rule = RouteRule::new("/carts", "carts", "http://carts:8080");
        assert_eq!(rule.upstream_path("/carts/u-1/items"), "/carts/u-1/items");
    }

    #[test]
    fn test_upstream_path_with_rewrite() {
        let rule =
            RouteRule::new("/catalogue", "catalogue", "http://catalogue:8080").with_rewrite("/v2");
        assert_eq!(rule.upstream_path("/catalogue/size"), "/v2/size");
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: RouteRule = serde_json::from_str(
            r#"{"prefix": "/orders", "service": "orders", "upstream": "http://orders:8080"}"#,
        )
        .unwrap();
        assert_eq!(rule.auth, AuthPolicy::Never);
        assert!(!rule.cacheable);
        assert!(rule.invalidate_on_write.is_empty());
    }

    #[test]
    fn test_rule_deserializes_policy_and_ttl() {
        let rule: RouteRule = serde_json::from_str(
            r#"{
                "prefix": "/carts",
                "service": "carts",
                "upstream": "http://carts:8080",
                "auth": "mutating_only",
                "cacheable": true,
                "cache_ttl": "45s",
                "invalidate_on_write": ["GET:/carts*"]
            }"#,
        )
        .unwrap();
        assert_eq!(rule.auth, AuthPolicy::MutatingOnly);
        assert_eq!(rule.cache_ttl, Some(Duration::from_secs(45)));
        assert_eq!(rule.invalidate_on_write, vec!["GET:/carts*".to_string()]);
    }
}
