//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the gateway's subsystems from configuration
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, logging, limits, auth)
//! - Serve until shutdown, then tear down the pooled upstream client

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::env_file::EnvFile;
use crate::config::schema::{CorsConfig, GatewayConfig};
use crate::containers::ComposeController;
use crate::gateway::Gateway;
use crate::http::handlers;
use crate::http::middleware::{logging_middleware, require_bearer};
use crate::lifecycle::Shutdown;
use crate::models::{HubCacheStore, LifecycleSettings, ModelCatalog, ModelLifecycle};
use crate::resilience::ResilientExecutor;
use crate::security::{rate_limit_middleware, RateLimiter};
use crate::upstream::{TransportError, TransportPool, TransportSettings, UpstreamTarget};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub api_key: Arc<str>,
    pub metrics: Option<PrometheusHandle>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    transport: Arc<TransportPool>,
    limiter: Option<Arc<RateLimiter>>,
}

impl GatewayServer {
    /// Build every subsystem from `config`.
    pub fn new(
        config: &GatewayConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(TransportPool::new(TransportSettings::from_config(
            &config.upstream,
            &config.timeouts,
        )));
        let target = UpstreamTarget::parse(&config.upstream.base_url)?;
        let executor = Arc::new(ResilientExecutor::new(transport.clone(), target));

        let lifecycle = Arc::new(ModelLifecycle::new(
            Arc::new(HubCacheStore::from_config(&config.models)),
            Arc::new(ComposeController::from_config(&config.containers)),
            EnvFile::new(PathBuf::from(&config.models.env_file)),
            Arc::new(ModelCatalog::new(Duration::from_secs(
                config.models.catalog_ttl_secs,
            ))),
            executor.clone(),
            LifecycleSettings::from_config(config),
        ));
        let gateway = Arc::new(Gateway::new(executor, lifecycle, config));

        let state = AppState {
            gateway,
            api_key: Arc::from(config.auth.api_key.as_str()),
            metrics,
        };
        let limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.rate_limit)));

        let router = build_router(state, config, limiter.clone());
        Ok(Self {
            router,
            transport,
            limiter,
        })
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn transport(&self) -> &Arc<TransportPool> {
        &self.transport
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = &self.limiter {
            limiter.clone().spawn_cleanup(shutdown.subscribe());
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await?;

        self.transport.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(
    state: AppState,
    config: &GatewayConfig,
    limiter: Option<Arc<RateLimiter>>,
) -> Router {
    let mut chat = post(handlers::chat);
    if let Some(limiter) = limiter {
        chat = chat.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let protected = Router::new()
        .route("/api/chat", chat)
        .route("/api/models", get(handlers::list_models))
        .route("/api/model-status", get(handlers::model_status))
        .route("/api/download-progress", get(handlers::download_progress))
        .route("/api/download-model", post(handlers::download_model))
        .route("/api/delete-model", delete(handlers::delete_model))
        .route("/api/switch-model", post(handlers::switch_model))
        .route("/api/model-loading-status", get(handlers::model_loading_status))
        .route("/api/restart-api", post(handlers::restart_api))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let public = Router::new()
        .route("/", get(handlers::root))
        .route("/metrics", get(handlers::metrics))
        .route("/api/healthz", get(handlers::healthz));

    let request_id = HeaderName::from_static(X_REQUEST_ID);
    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(cors_layer(&config.cors))
                .layer(middleware::from_fn(logging_middleware))
                .layer(RequestBodyLimitLayer::new(config.listener.max_body_size)),
        )
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
