//! Authentication claims and the token-verification seam.
//!
//! The gateway never issues or decodes tokens itself. Verification is
//! delegated to a [`TokenVerifier`] collaborator; the gateway only carries
//! the resulting claims through the request and forwards them to upstreams
//! as trusted headers.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity claims attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Stable user identifier
    pub user_id: String,
    /// Email address, when the token carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Roles granted to the user
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AuthClaims {
    /// Create claims for a user id
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            roles: Vec::new(),
        }
    }

    /// Set the email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Add a role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Check whether the user holds a role
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Token verification collaborator.
///
/// Implementations validate a bearer token and return the claims it carries.
/// Verification may be network-bound; callers must treat it as fallible and
/// bounded by a timeout.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token, returning the claims on success
    ///
    /// # Errors
    /// Returns `GatewayError::Authentication` for missing/invalid/expired
    /// tokens, or other variants for collaborator failures.
    async fn verify(&self, token: &str) -> Result<AuthClaims, GatewayError>;
}
