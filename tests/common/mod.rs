//! Shared utilities for integration testing.
//!
//! The mock backend speaks just enough HTTP/1.1 over raw TCP to stand in for
//! an OpenAI-compatible inference server, including streams that break off
//! halfway.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use llm_gateway::config::GatewayConfig;
use llm_gateway::GatewayServer;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

pub const API_KEY: &str = "test-key";

/// What the mock backend sends back for one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A complete response with the given status and JSON body.
    Json(u16, String),
    /// Plain text, as served by a Prometheus endpoint.
    Text(u16, String),
    /// An event stream written chunk by chunk. With `complete = false` the
    /// connection is dropped after the last chunk without terminating the body.
    Sse { chunks: Vec<String>, complete: bool },
    /// A complete event stream with `gap` between chunks.
    PacedSse { chunks: Vec<String>, gap: Duration },
    /// Read the request, then close the connection without answering.
    Drop,
    /// Accept the request and never answer.
    Hang,
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Base URL including the API version segment.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a backend whose reply is chosen from the request path.
pub async fn start_backend<F>(route: F) -> MockBackend
where
    F: Fn(&str) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let route = Arc::new(route);

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let route = route.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                serve_one(socket, route.as_ref(), &counter).await;
            });
        }
    });

    MockBackend { addr, hits }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn serve_one<F>(mut socket: TcpStream, route: &F, hits: &AtomicUsize)
where
    F: Fn(&str) -> MockReply,
{
    let Some(path) = read_request(&mut socket).await else {
        return;
    };
    hits.fetch_add(1, Ordering::SeqCst);

    match route(&path) {
        MockReply::Json(status, body) => {
            write_complete(&mut socket, status, "application/json", &body).await;
        }
        MockReply::Text(status, body) => {
            write_complete(&mut socket, status, "text/plain", &body).await;
        }
        MockReply::Sse { chunks, complete } => {
            write_event_stream(&mut socket, chunks, Duration::from_millis(5), complete).await;
        }
        MockReply::PacedSse { chunks, gap } => {
            write_event_stream(&mut socket, chunks, gap, true).await;
        }
        MockReply::Drop => {}
        MockReply::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

/// Write a chunked event stream. With `complete = false` the socket is
/// dropped after the last chunk, mid-body.
async fn write_event_stream(socket: &mut TcpStream, chunks: Vec<String>, gap: Duration, complete: bool) {
    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                transfer-encoding: chunked\r\nconnection: close\r\n\r\n";
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for chunk in chunks {
        let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        if socket.write_all(framed.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(gap).await;
    }
    if complete {
        let _ = socket.write_all(b"0\r\n\r\n").await;
        let _ = socket.shutdown().await;
    }
}

/// Read the request head and drain any body. Returns the request path.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let path = head.split_whitespace().nth(1)?.to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut received = buf.len() - head_end;
    while received < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        received += n;
    }
    Some(path)
}

async fn write_complete(socket: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} {}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        reason(status),
        body.len(),
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Gateway configuration pointed at `base_url`, with short retry budgets and
/// on-disk state kept inside `dir`.
pub fn test_config(base_url: &str, dir: &TempDir) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.connect_timeout_secs = 1;
    config.auth.api_key = API_KEY.to_string();
    config.retries.max_attempts = 2;
    config.retries.delay_ms = 10;
    config.retries.listing_max_attempts = 2;
    config.timeouts.upstream_secs = 2;
    config.timeouts.stream_secs = 2;
    config.timeouts.retry_secs = 1;
    config.timeouts.health_probe_secs = 1;
    config.timeouts.loading_probe_secs = 1;
    config.timeouts.metrics_probe_secs = 1;
    config.rate_limit.enabled = false;
    config.models.hub_dir = dir.path().join("hub").to_string_lossy().into_owned();
    config.models.env_file = dir.path().join(".env").to_string_lossy().into_owned();
    config.observability.metrics_enabled = false;
    config
}

/// Build the fully layered router for `config`.
pub fn router(config: &GatewayConfig) -> Router {
    GatewayServer::new(config, None).unwrap().router()
}

pub fn authorized(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header("authorization", format!("Bearer {API_KEY}"))
}

/// Send one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// A minimal valid chat body.
pub fn chat_body(stream: bool) -> String {
    serde_json::json!({
        "model": "test-model",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": stream,
    })
    .to_string()
}
