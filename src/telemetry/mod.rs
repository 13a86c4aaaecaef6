//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::{
    record_cycle_cancelled, record_cycle_failure, record_cycle_success, set_average_gauges,
};

use crate::config::TelemetryConfig;

/// Initialize logging and the metrics exporter
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level)?;

    if config.metrics_port != 0 {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics_port))
            .install()?;
        tracing::info!(port = config.metrics_port, "Prometheus exporter listening");
    }

    Ok(())
}
