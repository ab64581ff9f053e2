//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe dispatch counters

pub mod logging;
pub mod metrics;

pub use metrics::{DispatchMetrics, MetricsSnapshot};
