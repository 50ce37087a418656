//! # Gateway Core
//!
//! Shared foundation for the API gateway:
//! - Error taxonomy mapped to HTTP status codes
//! - Authentication claims and the token-verification seam
//! - Types shared between the dispatcher and the resilience layer

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod types;

pub use auth::{AuthClaims, TokenVerifier};
pub use error::{GatewayError, GatewayResult};
pub use types::{CachedResponse, REQUEST_ID_HEADER, USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLES_HEADER};
