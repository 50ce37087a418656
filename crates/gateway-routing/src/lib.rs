//! # Gateway Routing
//!
//! Declarative route rules and the longest-prefix routing table that maps
//! incoming request paths to upstream services.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rules;
pub mod table;

pub use rules::{AuthPolicy, RouteRule};
pub use table::RoutingTable;
