//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_upstream_attempts_total` (counter): attempts by `kind` (pooled, fresh)
//! - `gateway_upstream_failures_total` (counter): transport failures by `class`
//! - `gateway_stream_faults_total` (counter): relays ended by a synthetic error frame
//! - `gateway_downloads_total` (counter): finished downloads by `outcome`
//! - `gateway_model_switches_total` (counter): accepted model switches
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//!
//! # Design Decisions
//! - The recorder is process-global; without one every call is a no-op
//! - The exporter renders on demand inside `/metrics`, no extra listener

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Returns `None` if one is already set.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            tracing::info!("Prometheus recorder installed");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

pub fn record_upstream_attempt(kind: &'static str) {
    counter!("gateway_upstream_attempts_total", "kind" => kind).increment(1);
}

pub fn record_upstream_failure(class: &'static str) {
    counter!("gateway_upstream_failures_total", "class" => class).increment(1);
}

pub fn record_stream_fault() {
    counter!("gateway_stream_faults_total").increment(1);
}

pub fn record_download(outcome: &'static str) {
    counter!("gateway_downloads_total", "outcome" => outcome).increment(1);
}

pub fn record_model_switch() {
    counter!("gateway_model_switches_total").increment(1);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}
