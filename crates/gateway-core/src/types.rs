//! Types shared between the dispatcher and the resilience layer.

use serde::{Deserialize, Serialize};

/// Correlation id header, echoed to callers and forwarded to upstreams
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Trusted identity header injected for authenticated requests
pub const USER_ID_HEADER: &str = "x-user-id";
/// Trusted email header injected for authenticated requests
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Trusted roles header (comma-separated) injected for authenticated requests
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// A cached upstream response.
///
/// Only the status, a whitelisted header set and the body are retained;
/// hop-by-hop headers are dropped at store time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code of the original response
    pub status: u16,
    /// Retained headers (name, value)
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Create a cached response
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Retain a header with the response
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_response_headers() {
        let cached = CachedResponse::new(200, b"{}".to_vec())
            .with_header("content-type", "application/json");

        assert_eq!(cached.status, 200);
        assert_eq!(
            cached.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }
}
