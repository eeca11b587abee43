//! Streams obtained on a retry, and streams that outlive the attempt deadline.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use futures_util::StreamExt;
use llm_gateway::resilience::{ResilientExecutor, RetryPolicy};
use llm_gateway::streaming::relay;
use llm_gateway::upstream::{TransportPool, TransportSettings, UpstreamRequest, UpstreamTarget};
use serde_json::json;
use tempfile::TempDir;

const FRAME_GAP: Duration = Duration::from_millis(400);

fn numbered_frames(count: usize) -> Vec<String> {
    let mut chunks: Vec<String> = (0..count).map(|n| format!("data: {{\"n\":{n}}}\n\n")).collect();
    chunks.push("data: [DONE]\n\n".to_string());
    chunks
}

/// Backend that drops the first `drops` connections, then streams.
async fn flaky_stream_backend(drops: usize, frames: usize) -> MockBackend {
    let calls = Arc::new(AtomicUsize::new(0));
    start_backend(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) < drops {
            MockReply::Drop
        } else {
            MockReply::PacedSse {
                chunks: numbered_frames(frames),
                gap: FRAME_GAP,
            }
        }
    })
    .await
}

#[tokio::test]
async fn test_stream_from_retry_outlives_retry_deadline() {
    let backend = flaky_stream_backend(1, 5).await;

    let pool = Arc::new(TransportPool::new(TransportSettings {
        read_timeout: Duration::from_secs(5),
        ..TransportSettings::default()
    }));
    let executor = ResilientExecutor::new(pool, UpstreamTarget::parse(&backend.base_url()).unwrap());
    let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(30), Duration::from_secs(1));

    let request = UpstreamRequest::chat_completions(json!({"model": "m", "stream": true}), true);
    let response = executor.execute(&request, &policy).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 2);

    // Five frames 400 ms apart take twice the retry deadline.
    let frames: Vec<String> = relay(Box::pin(response.bytes_stream()))
        .map(|frame| String::from_utf8(frame.to_vec()).unwrap())
        .collect()
        .await;

    assert_eq!(frames, numbered_frames(5));
}

#[tokio::test]
async fn test_chat_stream_after_retry_reaches_done() {
    let backend = flaky_stream_backend(1, 6).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&backend.base_url(), &dir);
    config.timeouts.stream_secs = 5;
    let router = router(&config);

    let request = authorized(Request::post("/api/chat"))
        .header("content-type", "application/json")
        .body(Body::from(chat_body(true)))
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert_eq!(body, numbered_frames(6).concat());
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_first_attempt_stream_outlives_stream_deadline() {
    let backend = flaky_stream_backend(0, 6).await;
    let dir = TempDir::new().unwrap();
    // stream_secs bounds the wait for headers and each read, not the whole body.
    let router = router(&test_config(&backend.base_url(), &dir));

    let request = authorized(Request::post("/api/chat"))
        .header("content-type", "application/json")
        .body(Body::from(chat_body(true)))
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert_eq!(body, numbered_frames(6).concat());
    assert!(!body.contains("stream_error"));
}
