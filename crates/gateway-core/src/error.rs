//! Error types and handling for the gateway.
//!
//! This module provides the error hierarchy for the request path. Every
//! variant maps to the HTTP status code the caller sees; upstream detail is
//! kept for logging and never leaks into transport-level failures.

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type covering the full request-path taxonomy
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No routing rule matched the request path
    #[error("No route matches path: {path}")]
    NoRoute {
        /// Path that failed to match
        path: String,
    },

    /// Authentication failed (missing, malformed or invalid token)
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message
        message: String,
    },

    /// Authorization denied (valid identity, insufficient role)
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Error message
        message: String,
    },

    /// Circuit breaker is open for a service
    #[error("Circuit breaker open for service: {service}")]
    CircuitOpen {
        /// Service with the open breaker
        service: String,
    },

    /// Service rejected before any upstream call (breaker open and probe unhealthy)
    #[error("Service temporarily unavailable: {service}")]
    ServiceUnavailable {
        /// Service that was rejected
        service: String,
    },

    /// Upstream responded with an error status
    #[error("Upstream error from {service}: status {status}")]
    Upstream {
        /// Service that responded
        service: String,
        /// HTTP status code returned by the upstream
        status: u16,
    },

    /// Transport-level failure reaching the upstream (connect/reset)
    #[error("Transport failure for {service}: {message}")]
    Transport {
        /// Service that could not be reached
        service: String,
        /// Underlying error detail (logged, never surfaced to callers)
        message: String,
    },

    /// Call timed out
    #[error("Request timeout after {duration:?}")]
    Timeout {
        /// Duration after which the call timed out
        duration: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoRoute { .. } => StatusCode::NOT_FOUND,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            // Transport failures and timeouts surface as 503 so callers
            // retry against the gateway rather than treating it as a proxy
            // protocol error.
            Self::CircuitOpen { .. }
            | Self::ServiceUnavailable { .. }
            | Self::Transport { .. }
            | Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error type string for API responses
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NoRoute { .. } => "routing_error",
            Self::Authentication { .. } => "authentication_error",
            Self::Authorization { .. } => "authorization_error",
            Self::CircuitOpen { .. } | Self::ServiceUnavailable { .. } => "unavailable_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Transport { .. } | Self::Timeout { .. } => "transport_error",
            Self::Configuration { .. } | Self::Internal { .. } => "internal_error",
        }
    }

    /// Create a no-route error
    #[must_use]
    pub fn no_route(path: impl Into<String>) -> Self {
        Self::NoRoute { path: path.into() }
    }

    /// Create an authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a circuit-open error
    #[must_use]
    pub fn circuit_open(service: impl Into<String>) -> Self {
        Self::CircuitOpen {
            service: service.into(),
        }
    }

    /// Create a service-unavailable error
    #[must_use]
    pub fn service_unavailable(service: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: service.into(),
        }
    }

    /// Create an upstream error
    #[must_use]
    pub fn upstream(service: impl Into<String>, status: u16) -> Self {
        Self::Upstream {
            service: service.into(),
            status,
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GatewayError::no_route("/api/v1/unknown").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::authentication("missing token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::authorization("admin only").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::service_unavailable("orders").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::transport("carts", "connection refused").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::timeout(Duration::from_secs(30)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::upstream("orders", 502).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_upstream_status_passthrough() {
        assert_eq!(
            GatewayError::upstream("orders", 409).status_code(),
            StatusCode::CONFLICT
        );
    }
}
