//! Upstream request description and URL construction.

use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::resilience::timeouts::TimeoutTier;
use crate::upstream::TransportError;

/// Whether a path hangs off the API base (`/v1`) or off the server origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScope {
    /// Joined onto the configured base URL, e.g. `/chat/completions`.
    Api,
    /// Joined onto the base URL with its API version segment removed, e.g. `/metrics`.
    Origin,
}

/// One call to the upstream backend. Built per inbound request, never mutated.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    method: Method,
    path: String,
    scope: PathScope,
    body: Option<Value>,
    streaming: bool,
    timeout: TimeoutTier,
}

impl UpstreamRequest {
    /// `GET` against the API base.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            scope: PathScope::Api,
            body: None,
            streaming: false,
            timeout: TimeoutTier::Interactive,
        }
    }

    /// `POST` with a JSON body against the API base.
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            scope: PathScope::Api,
            body: Some(body),
            streaming: false,
            timeout: TimeoutTier::Interactive,
        }
    }

    /// Chat completions; streaming requests get the long timeout tier.
    pub fn chat_completions(body: Value, streaming: bool) -> Self {
        Self::post_json("/chat/completions", body).streaming(streaming)
    }

    /// Model listing.
    pub fn models() -> Self {
        Self::get("/models")
    }

    /// Prometheus metrics, served from the origin rather than the API base.
    pub fn metrics() -> Self {
        let mut request = Self::get("/metrics");
        request.scope = PathScope::Origin;
        request
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        if streaming {
            self.timeout = TimeoutTier::Streaming;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: TimeoutTier) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scope(&self) -> PathScope {
        self.scope
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn timeout_tier(&self) -> TimeoutTier {
        self.timeout
    }
}

/// The single upstream base URL every request is resolved against.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    base: Url,
}

impl UpstreamTarget {
    pub fn parse(base_url: &str) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)
            .map_err(|e| TransportError::Invalid(format!("{base_url}: {e}")))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve the absolute URL for a request.
    pub fn resolve(&self, request: &UpstreamRequest) -> Url {
        let base_path = self.base.path().trim_end_matches('/');
        let base_path = match request.scope() {
            PathScope::Api => base_path,
            PathScope::Origin => strip_api_version(base_path),
        };
        join_path(&self.base, base_path, request.path())
    }
}

/// Drop a trailing `/v<digits>` segment: `/v1` → ``, `/api/v1` → `/api`.
fn strip_api_version(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((head, last))
            if last.len() > 1
                && last.starts_with('v')
                && last[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            head
        }
        _ => path,
    }
}

fn join_path(base: &Url, base_path: &str, path: &str) -> Url {
    let trimmed = path.trim_start_matches('/');
    let full_path = if base_path.is_empty() {
        format!("/{trimmed}")
    } else if trimmed.is_empty() {
        base_path.to_string()
    } else {
        format!("{base_path}/{trimmed}")
    };

    let mut url = base.clone();
    url.set_path(&full_path);
    url.set_query(None);
    url
}
