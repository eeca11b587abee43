//! Outbound HTTP transport management.
//!
//! # Responsibilities
//! - Own the long-lived pooled client (keep-alive, shared)
//! - Build throwaway clients that force a new socket and DNS lookup
//! - Tear the pooled client down at shutdown
//!
//! # Design Decisions
//! - Lazy creation behind a mutex: two racing callers never build two pools
//! - Reads after creation are lock-free (`ArcSwapOption`)
//! - Fresh clients keep zero idle connections and speak HTTP/1.1 only

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::schema::{TimeoutConfig, UpstreamConfig};
use crate::upstream::{TransportError, UpstreamRequest};

/// Source of transport handles for the retry executor.
///
/// `TransportPool` is the production implementation; tests substitute
/// connectors that script failures and count handle lifetimes.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Send + Sync;

    /// The shared keep-alive handle.
    fn pooled(&self) -> Result<Self::Handle, TransportError>;

    /// A single-use handle with a guaranteed new connection.
    fn fresh(&self) -> Result<Self::Handle, TransportError>;

    /// Issue one request through `handle`. `timeout` bounds the wait for
    /// response headers; the body is not covered by it.
    async fn send(
        &self,
        handle: &Self::Handle,
        request: &UpstreamRequest,
        url: &Url,
        timeout: Duration,
    ) -> Result<reqwest::Response, TransportError>;

    /// Release a handle. Fresh handles are gone after this call.
    fn close(&self, handle: Self::Handle);
}

/// Client tuning shared by pooled and fresh handles.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Idle keep-alive connections kept per host by the pooled client.
    pub max_idle_per_host: usize,
    /// How long an idle pooled connection may linger.
    pub pool_idle_timeout: Duration,
    /// TCP/TLS establishment deadline.
    pub connect_timeout: Duration,
    /// Long tier: per-read idle deadline for response bodies.
    pub read_timeout: Duration,
}

impl TransportSettings {
    pub fn from_config(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            max_idle_per_host: upstream.max_idle_per_host,
            pool_idle_timeout: Duration::from_secs(upstream.pool_idle_timeout_secs),
            connect_timeout: Duration::from_secs(upstream.connect_timeout_secs),
            read_timeout: Duration::from_secs(timeouts.stream_secs),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&UpstreamConfig::default(), &TimeoutConfig::default())
    }
}

/// A client checked out for one attempt.
#[derive(Debug, Clone)]
pub enum TransportHandle {
    /// The process-wide keep-alive client.
    Pooled(Arc<Client>),
    /// A one-shot client owned by a single retry attempt.
    Fresh(Client),
}

impl TransportHandle {
    pub fn client(&self) -> &Client {
        match self {
            TransportHandle::Pooled(client) => client,
            TransportHandle::Fresh(client) => client,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, TransportHandle::Fresh(_))
    }
}

/// Owner of the pooled upstream client.
pub struct TransportPool {
    settings: TransportSettings,
    pooled: ArcSwapOption<Client>,
    init_lock: Mutex<()>,
}

impl TransportPool {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            pooled: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
        }
    }

    /// Return the pooled client, building it on first use.
    pub fn get_pooled(&self) -> Result<Arc<Client>, TransportError> {
        if let Some(client) = self.pooled.load_full() {
            return Ok(client);
        }

        let _guard = self
            .init_lock
            .lock()
            .map_err(|_| TransportError::Invalid("transport pool lock poisoned".into()))?;

        // Another caller may have finished creation while we waited.
        if let Some(client) = self.pooled.load_full() {
            return Ok(client);
        }

        let client = Arc::new(self.build_pooled()?);
        self.pooled.store(Some(client.clone()));
        tracing::debug!(
            max_idle_per_host = self.settings.max_idle_per_host,
            "Pooled upstream client created"
        );
        Ok(client)
    }

    /// Build a client that cannot reuse any existing connection.
    pub fn get_fresh(&self) -> Result<Client, TransportError> {
        Client::builder()
            .pool_max_idle_per_host(0)
            .http1_only()
            .connect_timeout(self.settings.connect_timeout)
            .read_timeout(self.settings.read_timeout)
            .build()
            .map_err(TransportError::from)
    }

    /// Drop the pooled client. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.pooled.swap(None).is_some() {
            tracing::info!("Pooled upstream client closed");
        }
    }

    /// Whether a pooled client currently exists.
    pub fn is_initialized(&self) -> bool {
        self.pooled.load().is_some()
    }

    fn build_pooled(&self) -> Result<Client, TransportError> {
        Client::builder()
            .pool_max_idle_per_host(self.settings.max_idle_per_host)
            .pool_idle_timeout(self.settings.pool_idle_timeout)
            .connect_timeout(self.settings.connect_timeout)
            .read_timeout(self.settings.read_timeout)
            .build()
            .map_err(TransportError::from)
    }
}

#[async_trait]
impl Connector for TransportPool {
    type Handle = TransportHandle;

    fn pooled(&self) -> Result<TransportHandle, TransportError> {
        self.get_pooled().map(TransportHandle::Pooled)
    }

    fn fresh(&self) -> Result<TransportHandle, TransportError> {
        self.get_fresh().map(TransportHandle::Fresh)
    }

    async fn send(
        &self,
        handle: &TransportHandle,
        request: &UpstreamRequest,
        url: &Url,
        timeout: Duration,
    ) -> Result<reqwest::Response, TransportError> {
        let mut builder = handle
            .client()
            .request(request.method().clone(), url.clone());

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if request.is_streaming() {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        // The deadline covers the wait for response headers only. Body reads
        // are bounded per read by the client's `read_timeout`, so a healthy
        // stream may outlive the attempt deadline.
        match tokio::time::timeout(timeout, builder.send()).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::Timeout(format!(
                "no response headers within {}s",
                timeout.as_secs_f64()
            ))),
        }
    }

    fn close(&self, handle: TransportHandle) {
        if handle.is_fresh() {
            tracing::trace!("Fresh upstream client released");
        }
        drop(handle);
    }
}
