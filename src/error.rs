//! HTTP-facing error taxonomy.
//!
//! Every failure that reaches a handler ends up here and is rendered as
//! `{"error": <label>, "detail": <message>, "status_code": <code>}`.
//! Upstream error *responses* never pass through this type; they are
//! relayed as received.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::gateway::chat::FieldError;
use crate::models::{ArtifactError, LifecycleError};
use crate::upstream::TransportError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure that survived the retry budget.
    #[error(transparent)]
    Upstream(#[from] TransportError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("invalid request")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: serde_json::Value,
    status_code: u16,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Upstream(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_) | GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Lifecycle(e) => match e {
                LifecycleError::NotFound(_) | LifecycleError::Artifact(ArtifactError::NotFound(_)) => {
                    StatusCode::NOT_FOUND
                }
                LifecycleError::Artifact(ArtifactError::InvalidId(_)) => StatusCode::BAD_REQUEST,
                LifecycleError::DownloadInProgress(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn label(&self) -> &'static str {
        match self.status() {
            StatusCode::GATEWAY_TIMEOUT => "upstream_timeout",
            StatusCode::BAD_GATEWAY => "bad_gateway",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::UNPROCESSABLE_ENTITY => "validation_error",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::CONFLICT => "conflict",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::TOO_MANY_REQUESTS => "rate_limited",
            _ => "internal_error",
        }
    }

    fn detail(&self) -> serde_json::Value {
        match self {
            GatewayError::Upstream(e) if e.is_timeout() => {
                "Request to vLLM server timed out".into()
            }
            GatewayError::Upstream(e) => format!("Failed to connect to vLLM server: {e}").into(),
            GatewayError::Validation(errors) => serde_json::to_value(errors).unwrap_or_default(),
            other => other.to_string().into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.label(),
            detail: self.detail(),
            status_code: status.as_u16(),
        };
        let mut response = (status, Json(body)).into_response();

        match &self {
            GatewayError::Unauthorized => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            GatewayError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            _ => {}
        }
        response
    }
}
