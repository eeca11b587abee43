//! End-to-end request flows through the layered router against a mock backend.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use tempfile::TempDir;

const MODELS: &str = r#"{"object":"list","data":[{"id":"org/model","object":"model"}]}"#;
const COMPLETION: &str = r#"{"id":"cmpl-1","choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;

fn chat_request(stream: bool) -> Request<Body> {
    authorized(Request::post("/api/chat"))
        .header("content-type", "application/json")
        .body(Body::from(chat_body(stream)))
        .unwrap()
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let backend = start_backend(|_| MockReply::Json(200, MODELS.to_string())).await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let missing = send(&router, Request::get("/api/models").body(Body::empty()).unwrap()).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.headers()["www-authenticate"], "Bearer");

    let wrong = send(
        &router,
        Request::get("/api/models")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong).await["error"], "unauthorized");

    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_root_and_request_id() {
    let dir = TempDir::new().unwrap();
    let router = router(&test_config("http://127.0.0.1:9/v1", &dir));

    let response = send(&router, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["endpoints"]["chat"], "/api/chat");
    assert_eq!(body["endpoints"]["health"], "/api/healthz");

    let echoed = send(
        &router,
        Request::get("/")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(echoed.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_health_reports_loaded_model_and_queue() {
    let backend = start_backend(|path| match path {
        "/v1/models" => MockReply::Json(200, MODELS.to_string()),
        "/metrics" => MockReply::Text(
            200,
            "vllm:num_requests_waiting{model_name=\"org/model\"} 4.0\n".to_string(),
        ),
        _ => MockReply::Json(404, "{}".to_string()),
    })
    .await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let response = send(&router, Request::get("/api/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["current_model"], "org/model");
    assert_eq!(body["queue_size"], 4);
}

#[tokio::test]
async fn test_health_without_backend_is_unhealthy_not_an_error() {
    let addr = closed_port().await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&format!("http://{addr}/v1"), &dir));

    let response = send(&router, Request::get("/api/healthz").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["upstream_healthy"], false);
    assert!(body["queue_size"].is_null());
}

#[tokio::test]
async fn test_chat_passthrough() {
    let backend = start_backend(|path| match path {
        "/v1/chat/completions" => MockReply::Json(200, COMPLETION.to_string()),
        _ => MockReply::Json(404, "{}".to_string()),
    })
    .await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let response = send(&router, chat_request(false)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, COMPLETION.as_bytes());
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_upstream_error_status_passes_through_without_retry() {
    let backend = start_backend(|_| {
        MockReply::Json(400, r#"{"object":"error","message":"bad prompt"}"#.to_string())
    })
    .await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let response = send(&router, chat_request(false)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "bad prompt");
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_invalid_chat_body_never_reaches_backend() {
    let backend = start_backend(|_| MockReply::Json(200, COMPLETION.to_string())).await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let body = serde_json::json!({
        "model": "test-model",
        "messages": [{"role": "user", "content": "hi"}],
        "temperature": 3.5,
    });
    let request = authorized(Request::post("/api/chat"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["detail"][0]["field"], "temperature");
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway_after_retries() {
    let addr = closed_port().await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&format!("http://{addr}/v1"), &dir));

    let response = send(&router, chat_request(false)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "bad_gateway");
}

#[tokio::test]
async fn test_silent_backend_is_gateway_timeout() {
    let backend = start_backend(|_| MockReply::Hang).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&backend.base_url(), &dir);
    config.retries.max_attempts = 1;
    config.timeouts.upstream_secs = 1;
    let router = router(&config);

    let response = send(&router, chat_request(false)).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "upstream_timeout");
    assert_eq!(body["status_code"], 504);
}

#[tokio::test]
async fn test_streaming_relays_frames_until_done() {
    let backend = start_backend(|_| MockReply::Sse {
        chunks: vec![
            ": keep-alive\n\n".to_string(),
            "data: {\"n\":1}\n\n".to_string(),
            "data: {\"n\":2}\n\ndata: [DONE]\n\n".to_string(),
        ],
        complete: true,
    })
    .await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let response = send(&router, chat_request(true)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let body = body_bytes(response).await;
    assert_eq!(
        body,
        "data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n".as_bytes()
    );
}

#[tokio::test]
async fn test_streaming_fault_ends_with_error_frame() {
    let backend = start_backend(|_| MockReply::Sse {
        chunks: vec!["data: {\"n\":1}\n\n".to_string()],
        complete: false,
    })
    .await;
    let dir = TempDir::new().unwrap();
    let router = router(&test_config(&backend.base_url(), &dir));

    let response = send(&router, chat_request(true)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    let frames: Vec<&str> = body.split_terminator("\n\n").collect();
    assert_eq!(frames.first(), Some(&"data: {\"n\":1}"));

    let last = frames.last().unwrap().trim_start_matches("data: ");
    let error: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(error["type"], "stream_error");
}

#[tokio::test]
async fn test_chat_is_rate_limited_per_client() {
    let backend = start_backend(|_| MockReply::Json(200, COMPLETION.to_string())).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&backend.base_url(), &dir);
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_minute = 1;
    config.rate_limit.burst_size = 1;
    let router = router(&config);

    assert_eq!(send(&router, chat_request(false)).await.status(), StatusCode::OK);

    let limited = send(&router, chat_request(false)).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
    assert_eq!(backend.hits(), 1);

    // Other endpoints are not limited.
    let progress = send(
        &router,
        authorized(Request::get("/api/download-progress")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(progress.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_download_progress_idle_placeholder() {
    let dir = TempDir::new().unwrap();
    let router = router(&test_config("http://127.0.0.1:9/v1", &dir));

    let response = send(
        &router,
        authorized(Request::get("/api/download-progress?model_id=org/model"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "idle");
    assert_eq!(body["model"], "org/model");
    assert_eq!(body["progress"], 0);
}

#[tokio::test]
async fn test_switch_to_missing_model_is_not_found() {
    let dir = TempDir::new().unwrap();
    let router = router(&test_config("http://127.0.0.1:9/v1", &dir));

    let response = send(
        &router,
        authorized(Request::post("/api/switch-model?model_id=org/absent"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_query_parameter_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let router = router(&test_config("http://127.0.0.1:9/v1", &dir));

    let response = send(
        &router,
        authorized(Request::delete("/api/delete-model")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
