//! # Gateway Config
//!
//! Configuration schema, file loading with environment substitution, and
//! validation for the gateway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource};
pub use schema::{
    AuthConfig, CacheSettings, GatewayConfig, HealthSettings, ResilienceSettings, ServerConfig,
    ServiceConfig,
};
