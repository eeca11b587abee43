//! Gateway facade.
//!
//! # Responsibilities
//! - Proxy chat completions and model listing through the executor
//! - Hand streamed chat bodies to the relay
//! - Build health snapshots and fetch backend metrics
//! - Expose the model lifecycle coordinator to the HTTP layer
//!
//! # Data Flow
//! ```text
//! ChatRequest ─▶ validate ─▶ UpstreamRequest ─▶ ResilientExecutor
//!     ├─ non-2xx            ─▶ UpstreamReply::Buffered (passed through as-is)
//!     ├─ stream = false     ─▶ UpstreamReply::Buffered
//!     └─ stream = true      ─▶ UpstreamReply::Streaming(relay(body))
//! ```
//!
//! # Design Decisions
//! - A received response is never an error here, whatever its status
//! - Only transport failures that survived the retry budget become
//!   `GatewayError`s

pub mod chat;
pub mod health;

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::config::schema::{GatewayConfig, RetryConfig, TimeoutConfig};
use crate::error::GatewayError;
use crate::models::{ModelLifecycle, ModelListing};
use crate::resilience::{ResilientExecutor, RetryPolicy, TimeoutTier};
use crate::streaming::relay;
use crate::upstream::{Connector, TransportError, TransportPool, UpstreamRequest};

pub use chat::ChatRequest;
pub use health::{HealthSnapshot, HealthStatus};

/// What the backend answered, ready to be turned into a response.
pub enum UpstreamReply {
    Buffered {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },
    /// Relayed event-stream frames.
    Streaming(BoxStream<'static, Bytes>),
}

impl std::fmt::Debug for UpstreamReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamReply::Buffered { status, body, .. } => f
                .debug_struct("Buffered")
                .field("status", status)
                .field("len", &body.len())
                .finish(),
            UpstreamReply::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

pub struct Gateway<C: Connector = TransportPool> {
    executor: Arc<ResilientExecutor<C>>,
    lifecycle: Arc<ModelLifecycle<C>>,
    retries: RetryConfig,
    timeouts: TimeoutConfig,
}

impl<C: Connector> Gateway<C> {
    pub fn new(
        executor: Arc<ResilientExecutor<C>>,
        lifecycle: Arc<ModelLifecycle<C>>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            executor,
            lifecycle,
            retries: config.retries.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle<C>> {
        &self.lifecycle
    }

    /// Proxy one chat completion.
    pub async fn chat(&self, request: ChatRequest) -> Result<UpstreamReply, GatewayError> {
        request.validate().map_err(GatewayError::Validation)?;

        tracing::info!(
            model = %request.model,
            stream = request.stream,
            temperature = ?request.temperature,
            "Proxying chat completion"
        );

        let upstream = UpstreamRequest::chat_completions(request.to_upstream_body(), request.stream);
        let policy = RetryPolicy::for_request(&upstream, &self.retries, &self.timeouts);
        let response = self.executor.execute(&upstream, &policy).await?;

        if request.stream && response.status().is_success() {
            let frames = relay(Box::pin(response.bytes_stream()));
            return Ok(UpstreamReply::Streaming(Box::pin(frames)));
        }
        buffered(response).await
    }

    /// Proxy the backend's model listing.
    pub async fn list_models(&self) -> Result<UpstreamReply, GatewayError> {
        let request = UpstreamRequest::models();
        let policy = RetryPolicy::for_listing(&self.retries, &self.timeouts);
        let response = self.executor.execute(&request, &policy).await?;
        buffered(response).await
    }

    /// Probe the backend and assemble a fresh health snapshot.
    pub async fn health(&self) -> HealthSnapshot {
        let request = probe(UpstreamRequest::models(), self.timeouts.health_probe_secs);
        let policy = RetryPolicy::probe(&request, &self.timeouts);

        let listing = match self.executor.execute(&request, &policy).await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(body) => ModelListing::from_slice(&body),
                Err(e) => return HealthSnapshot::unreachable(Some(e.to_string())),
            },
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "Backend refused model listing");
                return HealthSnapshot::unreachable(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed");
                return HealthSnapshot::unreachable(Some(e.to_string()));
            }
        };

        HealthSnapshot::reachable(listing.ids(), self.queue_size().await)
    }

    /// Best-effort scrape of the backend's queue gauge.
    pub async fn queue_size(&self) -> Option<u64> {
        let request = probe(UpstreamRequest::metrics(), self.timeouts.metrics_probe_secs);
        let policy = RetryPolicy::probe(&request, &self.timeouts);

        match self.executor.execute(&request, &policy).await {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await.ok()?;
                health::parse_queue_size(&text)
            }
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Metrics scrape refused");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Metrics scrape failed");
                None
            }
        }
    }

    /// The backend's Prometheus text.
    pub async fn backend_metrics(&self) -> Result<String, GatewayError> {
        let request = probe(UpstreamRequest::metrics(), self.timeouts.health_probe_secs);
        let policy = RetryPolicy::probe(&request, &self.timeouts);

        let response = self.executor.execute(&request, &policy).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::BadGateway(format!(
                "Failed to fetch metrics from vLLM: upstream returned {status}"
            )));
        }
        response
            .text()
            .await
            .map_err(|e| GatewayError::BadGateway(format!("Failed to fetch metrics from vLLM: {e}")))
    }
}

fn probe(request: UpstreamRequest, secs: u64) -> UpstreamRequest {
    request.with_timeout(TimeoutTier::Probe(Duration::from_secs(secs)))
}

async fn buffered(response: reqwest::Response) -> Result<UpstreamReply, GatewayError> {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Upstream returned an error status");
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Upstream(TransportError::from(e)))?;
    Ok(UpstreamReply::Buffered {
        status,
        content_type,
        body,
    })
}
