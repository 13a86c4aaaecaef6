//! Refresh-cycle metrics

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

/// Record a successful refresh cycle and its latency
pub fn record_cycle_success(latency: Duration) {
    metrics::counter!("p2p_rates_cycles_total").increment(1);
    metrics::histogram!("p2p_rates_cycle_latency_ms").record(latency.as_millis() as f64);
}

/// Record a failed refresh cycle
pub fn record_cycle_failure() {
    metrics::counter!("p2p_rates_cycles_total").increment(1);
    metrics::counter!("p2p_rates_cycle_failures_total").increment(1);
}

/// Record a superseded refresh cycle
pub fn record_cycle_cancelled() {
    metrics::counter!("p2p_rates_cycles_cancelled_total").increment(1);
}

/// Publish the latest derived averages
pub fn set_average_gauges(primary: Option<Decimal>, secondary: Option<Decimal>) {
    if let Some(value) = primary.and_then(|d| d.to_f64()) {
        metrics::gauge!("p2p_rates_primary_average").set(value);
    }
    if let Some(value) = secondary.and_then(|d| d.to_f64()) {
        metrics::gauge!("p2p_rates_secondary_average").set(value);
    }
}
