//! # Gateway Resilience
//!
//! Resilience patterns for the API gateway:
//! - Circuit breaker for failing fast on unhealthy upstreams
//! - Breaker registry (one breaker per logical service)
//! - TTL response cache with glob-pattern invalidation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod circuit_breaker;
pub mod registry;

// Re-export main types
pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use registry::CircuitBreakerRegistry;
