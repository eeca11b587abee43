//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check the retry deadline is shorter than the first-attempt deadline
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if config.auth.api_key.trim().is_empty() {
        errors.push(ValidationError::new("auth.api_key", "must not be empty"));
    }

    let t = &config.timeouts;
    for (field, value) in [
        ("timeouts.upstream_secs", t.upstream_secs),
        ("timeouts.stream_secs", t.stream_secs),
        ("timeouts.retry_secs", t.retry_secs),
        ("timeouts.health_probe_secs", t.health_probe_secs),
        ("timeouts.loading_probe_secs", t.loading_probe_secs),
        ("timeouts.metrics_probe_secs", t.metrics_probe_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if t.retry_secs >= t.upstream_secs {
        errors.push(ValidationError::new(
            "timeouts.retry_secs",
            "must be shorter than timeouts.upstream_secs",
        ));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.listing_max_attempts == 0 {
        errors.push(ValidationError::new(
            "retries.listing_max_attempts",
            "must be at least 1",
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_minute == 0 {
            errors.push(ValidationError::new(
                "rate_limit.requests_per_minute",
                "must be greater than zero when enabled",
            ));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::new(
                "rate_limit.burst_size",
                "must be greater than zero when enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
