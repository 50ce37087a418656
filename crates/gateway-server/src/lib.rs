//! # Gateway Server
//!
//! HTTP surface of the API gateway: the proxy dispatcher that carries
//! requests to upstream services through the resilience layer, plus the
//! observability endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;

pub use routes::create_router;
pub use server::{Server, ServerError};
pub use state::AppState;
