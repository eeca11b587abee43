//! Response construction for proxied calls.
//!
//! # Responsibilities
//! - Relay buffered upstream answers with their status and content type
//! - Wrap relayed frames in an event-stream response
//!
//! # Design Decisions
//! - Streaming responses are never buffered; proxies are asked not to
//!   buffer them either (`X-Accel-Buffering: no`)
//! - Upstream error statuses are forwarded unchanged

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};

use crate::gateway::UpstreamReply;

pub const EVENT_STREAM: &str = "text/event-stream";

/// Turn a facade reply into an HTTP response.
pub fn upstream_reply(reply: UpstreamReply) -> Response {
    match reply {
        UpstreamReply::Buffered {
            status,
            content_type,
            body,
        } => {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            if let Some(content_type) = content_type {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, content_type);
            }
            response
        }
        UpstreamReply::Streaming(frames) => sse_response(frames),
    }
}

/// A live `text/event-stream` response over `frames`.
pub fn sse_response(frames: BoxStream<'static, Bytes>) -> Response {
    let body = Body::from_stream(frames.map(Ok::<_, Infallible>));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
