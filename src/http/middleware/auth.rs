//! Bearer-token authentication.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::http::server::AppState;

/// Reject requests whose `Authorization: Bearer` token is not the API key.
pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if keys_match(token, &state.api_key) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            GatewayError::Unauthorized.into_response()
        }
        None => GatewayError::Unauthorized.into_response(),
    }
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cres", "s3cret"));
        assert!(!keys_match("s3cret-longer", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }
}
