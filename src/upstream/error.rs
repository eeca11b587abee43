//! Transport-level failure taxonomy.

use thiserror::Error;

/// A failure that happened before any upstream response was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connect refused, DNS lookup failed, TLS handshake failed.
    #[error("connection to upstream failed: {0}")]
    Connect(String),

    /// The upstream closed the connection mid-exchange.
    #[error("upstream closed the connection: {0}")]
    Protocol(String),

    /// No response within the attempt's deadline.
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    /// Client construction or request building failed. Never retried.
    #[error("invalid upstream request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Connect, protocol and timeout failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Invalid(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }

    /// Short label used for metrics and log fields.
    pub fn class(&self) -> &'static str {
        match self {
            TransportError::Connect(_) => "connect",
            TransportError::Protocol(_) => "protocol",
            TransportError::Timeout(_) => "timeout",
            TransportError::Invalid(_) => "invalid",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            TransportError::Invalid(message)
        } else if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else {
            TransportError::Protocol(message)
        }
    }
}
