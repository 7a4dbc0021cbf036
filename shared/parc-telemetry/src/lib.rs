//! Parc Telemetry
//!
//! Logging bootstrap plus the small in-process counters the bridge reports
//! on its readiness endpoint.

mod config;
mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use metrics::{Counter, Gauge, Histogram, HistogramSnapshot};
pub use tracing_setup::init_tracing;

/// Install logging configured from `RUST_LOG` / `LOG_LEVEL` / `JSON_LOGS`
pub fn init(service_name: &str) -> Result<(), TelemetryError> {
    init_tracing(service_name, &TelemetryConfig::from_env())
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Logging setup failed: {0}")]
    TracingInit(String),
}
