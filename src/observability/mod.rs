//! # Observability
//!
//! Structured logging setup and the Prometheus counters the authorizers feed.

// Structured logging
pub mod logging;

// Decision and secret fetch counters
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{install_prometheus_recorder, record_decision, record_secret_fetch};
