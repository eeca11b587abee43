//! Retry logic.
//!
//! # Responsibilities
//! - Execute an upstream request with bounded attempts
//! - Escalate from the pooled client to fresh clients on retry
//! - Release every fresh client before its attempt's result is used
//!
//! # Design Decisions
//! - Connection errors, abrupt closes and timeouts are retryable
//! - Any received response ends the loop, including 4xx/5xx
//! - Retry attempts get a shorter deadline than the first attempt
//! - After the last attempt the last transport error is returned

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{RetryConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::resilience::timeouts::TimeoutTier;
use crate::upstream::{Connector, TransportError, TransportPool, UpstreamRequest, UpstreamTarget};

/// How many times, and how patiently, to try one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    inter_attempt_delay: Duration,
    first_attempt_timeout: Duration,
    retry_attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` is at least 1 and the retry deadline
    /// never exceeds the first-attempt deadline.
    pub fn new(
        max_attempts: u32,
        inter_attempt_delay: Duration,
        first_attempt_timeout: Duration,
        retry_attempt_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            inter_attempt_delay,
            first_attempt_timeout,
            retry_attempt_timeout: retry_attempt_timeout.min(first_attempt_timeout),
        }
    }

    /// One attempt on the pooled client, no retries.
    pub fn single(timeout: Duration) -> Self {
        Self::new(1, Duration::ZERO, timeout, timeout)
    }

    /// One attempt on the pooled client, bounded by the request's own tier.
    pub fn probe(request: &UpstreamRequest, timeouts: &TimeoutConfig) -> Self {
        Self::single(request.timeout_tier().resolve(timeouts))
    }

    /// Policy for proxied chat calls: the configured retry budget, first
    /// deadline taken from the request's tier.
    pub fn for_request(
        request: &UpstreamRequest,
        retries: &RetryConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self::new(
            retries.max_attempts,
            Duration::from_millis(retries.delay_ms),
            request.timeout_tier().resolve(timeouts),
            Duration::from_secs(timeouts.retry_secs),
        )
    }

    /// Policy for model listing: one immediate fresh-connection retry.
    pub fn for_listing(retries: &RetryConfig, timeouts: &TimeoutConfig) -> Self {
        Self::new(
            retries.listing_max_attempts,
            Duration::ZERO,
            TimeoutTier::Interactive.resolve(timeouts),
            Duration::from_secs(timeouts.retry_secs),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn inter_attempt_delay(&self) -> Duration {
        self.inter_attempt_delay
    }

    pub fn first_attempt_timeout(&self) -> Duration {
        self.first_attempt_timeout
    }

    pub fn retry_attempt_timeout(&self) -> Duration {
        self.retry_attempt_timeout
    }
}

/// The single place upstream calls are issued from.
pub struct ResilientExecutor<C: Connector = TransportPool> {
    connector: Arc<C>,
    target: UpstreamTarget,
}

impl<C: Connector> ResilientExecutor<C> {
    pub fn new(connector: Arc<C>, target: UpstreamTarget) -> Self {
        Self { connector, target }
    }

    /// Issue `request`, retrying transport failures per `policy`.
    pub async fn execute(
        &self,
        request: &UpstreamRequest,
        policy: &RetryPolicy,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.target.resolve(request);
        let max_attempts = policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let result = if attempt == 1 {
                let handle = self.connector.pooled()?;
                metrics::record_upstream_attempt("pooled");
                let result = self
                    .connector
                    .send(&handle, request, &url, policy.first_attempt_timeout())
                    .await;
                self.connector.close(handle);
                result
            } else {
                tracing::info!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.inter_attempt_delay().as_millis() as u64,
                    url = %url,
                    "Retrying upstream request with a fresh connection"
                );
                tokio::time::sleep(policy.inter_attempt_delay()).await;

                let handle = self.connector.fresh()?;
                metrics::record_upstream_attempt("fresh");
                let result = self
                    .connector
                    .send(&handle, request, &url, policy.retry_attempt_timeout())
                    .await;
                self.connector.close(handle);
                result
            };

            match result {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(
                            attempt,
                            status = response.status().as_u16(),
                            "Upstream reachable again"
                        );
                    }
                    return Ok(response);
                }
                Err(err) if err.is_retryable() => {
                    metrics::record_upstream_failure(err.class());
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        class = err.class(),
                        error = %err,
                        "Upstream attempt failed"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::error!(max_attempts, url = %url, "All upstream attempts failed");
        Err(last_error.unwrap_or_else(|| {
            TransportError::Connect("no attempt was made".to_string())
        }))
    }
}
