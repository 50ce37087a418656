//! # Gateway Health
//!
//! Periodic health probing of upstream services. The monitor keeps a
//! best-effort view of each upstream's reachability that the dispatcher
//! consults before failing a request fast.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod monitor;

pub use monitor::{HealthMonitor, HealthMonitorConfig, ServiceHealth};
