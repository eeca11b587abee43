//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream inference backend.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Bearer-token authentication.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Model storage and download settings.
    pub models: ModelsConfig,

    /// Container runtime settings.
    pub containers: ContainersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// OpenAI-compatible API base, including the version segment.
    pub base_url: String,

    /// Idle keep-alive connections kept by the pooled client.
    pub max_idle_per_host: usize,

    /// Idle pooled connection lifetime in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://vllm:8000/v1".to_string(),
            max_idle_per_host: 20,
            pool_idle_timeout_secs: 90,
            connect_timeout_secs: 10,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// First-attempt deadline for buffered calls, in seconds.
    pub upstream_secs: u64,

    /// First-attempt deadline for streamed calls, in seconds.
    pub stream_secs: u64,

    /// Deadline for every retry attempt, in seconds.
    pub retry_secs: u64,

    /// Health check probe deadline, in seconds.
    pub health_probe_secs: u64,

    /// Model loading probe deadline, in seconds.
    pub loading_probe_secs: u64,

    /// Queue-depth scrape deadline, in seconds.
    pub metrics_probe_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 300,
            stream_secs: 600,
            retry_secs: 10,
            health_probe_secs: 5,
            loading_probe_secs: 3,
            metrics_probe_secs: 2,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts for chat calls (first attempt included).
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// Maximum attempts for model listing calls.
    pub listing_max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 4000,
            listing_max_attempts: 2,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// API key expected as a Bearer token.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "change-me".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per minute per client.
    pub requests_per_minute: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst_size: 60,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Model storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// HuggingFace hub cache directory.
    pub hub_dir: String,

    /// Env file holding `DEFAULT_MODEL` for the backend.
    pub env_file: String,

    /// Downloaded-model listing cache lifetime in seconds.
    pub catalog_ttl_secs: u64,

    /// Command used to download models.
    pub fetch_command: String,

    /// HuggingFace access token for gated models.
    pub hf_token: Option<String>,

    /// Estimated seconds for the backend to load a switched model.
    pub switch_estimate_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            hub_dir: "/workspace/models/hub".to_string(),
            env_file: "/workspace/.env".to_string(),
            catalog_ttl_secs: 300,
            fetch_command: "huggingface-cli".to_string(),
            hf_token: None,
            switch_estimate_secs: 60,
        }
    }
}

/// Container runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainersConfig {
    /// Docker CLI binary.
    pub docker_bin: String,

    /// Directory holding the compose file.
    pub workdir: String,

    /// Compose project name.
    pub project: String,

    /// Compose service running the inference backend.
    pub backend_service: String,

    /// Container name of this gateway.
    pub gateway_container: String,

    /// Deadline for a single docker command, in seconds.
    pub command_timeout_secs: u64,

    /// Delay before the gateway restarts itself after a model switch.
    pub switch_restart_delay_secs: u64,

    /// Delay before a manually requested gateway restart.
    pub manual_restart_delay_secs: u64,
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            workdir: "/workspace".to_string(),
            project: "talktuah".to_string(),
            backend_service: "vllm".to_string(),
            gateway_container: "vllm-proxy-api".to_string(),
            command_timeout_secs: 120,
            switch_restart_delay_secs: 1,
            manual_restart_delay_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "text" or "json".
    pub log_format: String,

    /// Record gateway metrics and append them to `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.upstream.base_url, "http://vllm:8000/v1");
        assert_eq!(config.retries.max_attempts, 10);
        assert_eq!(config.timeouts.retry_secs, 10);
    }

    #[test]
    fn test_partial_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "http://localhost:8000/v1"

            [retries]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "http://localhost:8000/v1");
        assert_eq!(config.upstream.max_idle_per_host, 20);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.delay_ms, 4000);
    }
}
