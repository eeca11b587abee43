//! Backend health snapshot.
//!
//! Recomputed on every `/api/healthz` call and never cached. The queue depth
//! is scraped from the backend's Prometheus text on a best-effort basis: a
//! failed scrape leaves `queue_size` empty and is never reported as an error.

use serde::Serialize;

/// Gauge holding the number of requests queued by the backend.
pub const QUEUE_GAUGE: &str = "vllm:num_requests_waiting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Backend answers but has no model loaded.
    Degraded,
    /// Backend unreachable.
    Unhealthy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub gpu_available: bool,
    pub model_loaded: bool,
    pub upstream_healthy: bool,
    pub queue_size: Option<u64>,
    pub current_model: Option<String>,
    pub details: HealthDetails,
}

impl HealthSnapshot {
    /// Snapshot for a backend that answered its model listing.
    pub fn reachable(models: Vec<String>, queue_size: Option<u64>) -> Self {
        let model_loaded = !models.is_empty();
        Self {
            status: if model_loaded {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            gpu_available: model_loaded,
            model_loaded,
            upstream_healthy: true,
            queue_size,
            current_model: models.first().cloned(),
            details: HealthDetails {
                models: model_loaded.then_some(models),
                error: None,
            },
        }
    }

    /// Snapshot for a backend that could not be reached or refused the listing.
    pub fn unreachable(error: Option<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            gpu_available: false,
            model_loaded: false,
            upstream_healthy: false,
            queue_size: None,
            current_model: None,
            details: HealthDetails {
                models: None,
                error,
            },
        }
    }
}

/// Extract the queue gauge from Prometheus exposition text.
pub fn parse_queue_size(metrics_text: &str) -> Option<u64> {
    metrics_text
        .lines()
        .filter(|line| !line.starts_with('#') && line.contains(QUEUE_GAUGE))
        .filter_map(|line| line.split_whitespace().last()?.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .last()
        .map(|v| v as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue_size() {
        let text = "\
# HELP vllm:num_requests_waiting Number of requests waiting.
# TYPE vllm:num_requests_waiting gauge
vllm:num_requests_waiting{model_name=\"org/model\"} 3.0
vllm:num_requests_running{model_name=\"org/model\"} 1.0
";
        assert_eq!(parse_queue_size(text), Some(3));
    }

    #[test]
    fn test_parse_queue_size_missing_or_garbage() {
        assert_eq!(parse_queue_size(""), None);
        assert_eq!(parse_queue_size("vllm:num_requests_waiting NaN"), None);
        assert_eq!(parse_queue_size("vllm:num_requests_waiting lots"), None);
    }

    #[test]
    fn test_status_derivation() {
        let healthy = HealthSnapshot::reachable(vec!["org/model".into()], Some(0));
        assert_eq!(healthy.status, HealthStatus::Healthy);
        assert_eq!(healthy.current_model.as_deref(), Some("org/model"));

        let degraded = HealthSnapshot::reachable(Vec::new(), None);
        assert_eq!(degraded.status, HealthStatus::Degraded);
        assert!(degraded.upstream_healthy);
        assert!(degraded.details.models.is_none());

        let down = HealthSnapshot::unreachable(Some("connection refused".into()));
        assert_eq!(down.status, HealthStatus::Unhealthy);
        assert!(!down.gpu_available);
    }
}
