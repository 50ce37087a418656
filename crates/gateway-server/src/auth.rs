//! Token verifier implementations.
//!
//! The gateway fails closed: whatever goes wrong during verification, the
//! caller sees 401, never a pass-through.

use async_trait::async_trait;
use gateway_core::{AuthClaims, GatewayError, TokenVerifier};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Verifier backed by a remote auth service.
///
/// The bearer token is forwarded as-is; the service answers with the
/// claims JSON on success and any non-2xx status on rejection.
pub struct RemoteTokenVerifier {
    client: reqwest::Client,
    verify_url: String,
}

impl RemoteTokenVerifier {
    /// Create a verifier for an endpoint
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed; a
    /// verifier must not come up without its call timeout.
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl TokenVerifier for RemoteTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthClaims, GatewayError> {
        let response = self
            .client
            .post(&self.verify_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token verification service unreachable");
                GatewayError::authentication("Token verification unavailable")
            })?;

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "Token rejected");
            return Err(GatewayError::authentication("Invalid or expired token"));
        }

        response
            .json::<AuthClaims>()
            .await
            .map_err(|_| GatewayError::authentication("Malformed verification response"))
    }
}

/// Verifier over a fixed token map, for development and tests
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, AuthClaims>,
}

impl StaticTokenVerifier {
    /// Create from a token-to-claims map
    #[must_use]
    pub fn new(tokens: HashMap<String, AuthClaims>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthClaims, GatewayError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| GatewayError::authentication("Invalid or expired token"))
    }
}

/// Verifier rejecting everything, used when no auth backend is configured
pub struct DenyAllVerifier;

#[async_trait]
impl TokenVerifier for DenyAllVerifier {
    async fn verify(&self, _token: &str) -> Result<AuthClaims, GatewayError> {
        Err(GatewayError::authentication(
            "No token verification backend configured",
        ))
    }
}
