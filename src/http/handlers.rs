//! Route handlers.
//!
//! Thin adapters: extract, call the facade or the lifecycle coordinator,
//! render. All failures leave through `GatewayError`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::gateway::chat::{ChatRequest, FieldError};
use crate::http::response::upstream_reply;
use crate::http::server::AppState;
use crate::models::coordinator::DownloadAck;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    pub model_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub model_id: String,
    #[serde(default)]
    pub auto: bool,
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, GatewayError> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))
}

/// `GET /`: service name, version and endpoint map.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "LLM Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/api/chat",
            "models": "/api/models",
            "model_status": "/api/model-status",
            "model_loading_status": "/api/model-loading-status",
            "switch_model": "/api/switch-model",
            "restart_api": "/api/restart-api",
            "health": "/api/healthz",
            "metrics": "/metrics",
            "download_model": "/api/download-model",
            "download_progress": "/api/download-progress",
            "delete_model": "/api/delete-model",
        }
    }))
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(request) = body.map_err(|rejection| match rejection {
        JsonRejection::JsonDataError(e) => GatewayError::Validation(vec![FieldError {
            field: "body",
            message: e.body_text(),
        }]),
        other => GatewayError::BadRequest(other.body_text()),
    })?;

    let reply = state.gateway.chat(request).await?;
    Ok(upstream_reply(reply))
}

/// `GET /api/models`
pub async fn list_models(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let reply = state.gateway.list_models().await?;
    Ok(upstream_reply(reply))
}

/// `GET /api/healthz`, unauthenticated.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.health().await)
}

/// `GET /metrics`: backend metrics followed by the gateway's own.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let mut text = state.gateway.backend_metrics().await?;
    if let Some(handle) = &state.metrics {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&handle.render());
    }

    let mut response = text.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PROMETHEUS_TEXT),
    );
    Ok(response)
}

/// `GET /api/model-status`
pub async fn model_status(State(state): State<AppState>) -> Result<Response, GatewayError> {
    let status = state.gateway.lifecycle().model_status().await?;
    Ok(Json(status).into_response())
}

/// `GET /api/download-progress[?model_id=]`
pub async fn download_progress(
    State(state): State<AppState>,
    params: Result<Query<ProgressQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = query(params)?;
    let progress = state
        .gateway
        .lifecycle()
        .get_progress(params.model_id.as_deref());
    Ok(Json(progress).into_response())
}

/// `POST /api/download-model?model_id=&auto=`
pub async fn download_model(
    State(state): State<AppState>,
    params: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = query(params)?;
    let lifecycle = state.gateway.lifecycle();

    if params.auto {
        let start = lifecycle.start_download(&params.model_id)?;
        Ok(Json(DownloadAck::from(&start)).into_response())
    } else {
        Ok(Json(lifecycle.manual_download(&params.model_id)?).into_response())
    }
}

/// `DELETE /api/delete-model?model_id=`
pub async fn delete_model(
    State(state): State<AppState>,
    params: Result<Query<ModelQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = query(params)?;
    let ack = state.gateway.lifecycle().delete_model(&params.model_id).await?;
    Ok(Json(ack).into_response())
}

/// `POST /api/switch-model?model_id=`
pub async fn switch_model(
    State(state): State<AppState>,
    params: Result<Query<ModelQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = query(params)?;
    let ack = state.gateway.lifecycle().switch_model(&params.model_id).await?;
    Ok(Json(ack).into_response())
}

/// `GET /api/model-loading-status`
pub async fn model_loading_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.lifecycle().get_loading_status().await)
}

/// `POST /api/restart-api`
pub async fn restart_api(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.lifecycle().restart_api())
}
