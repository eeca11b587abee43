//! Model lifecycle coordinator.
//!
//! # Responsibilities
//! - Track one `DownloadState` per model id for the process lifetime
//! - Run downloads as detached background tasks, observable only by polling
//! - Switch the active model: persist, invalidate, recreate the backend and
//!   schedule a delayed gateway restart
//! - Tell "backend not up" apart from "loading weights" and "ready"
//!
//! # Data Flow
//! ```text
//! start_download ─▶ DashMap entry (Downloading, 0%) ─▶ spawn(run_download)
//!                                                         │
//!        get_progress ◀── 10% ── 25% ── fetch ── 90% ── complete | error
//!
//! switch_model ─▶ exists? ─▶ EnvFile ─▶ catalog.invalidate
//!              ─▶ recreate_backend (awaited) ─▶ spawn(sleep; restart_self)
//! ```
//!
//! # Design Decisions
//! - The DashMap entry lock makes "check in-flight, then insert" atomic, so
//!   concurrent starts for one model fold into a single task
//! - Every entry carries the id of the task that owns it; a task never
//!   writes into an entry a newer download has replaced
//! - The fetcher exposes no progress, so progress moves at fixed checkpoints

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::env_file::{EnvFile, PersistError};
use crate::config::schema::GatewayConfig;
use crate::containers::{ContainerController, ControllerError};
use crate::models::artifacts::{validate_model_id, ArtifactError, ArtifactStore};
use crate::models::catalog::ModelCatalog;
use crate::models::listing::ModelListing;
use crate::models::state::{DownloadState, DownloadStatus};
use crate::observability::metrics;
use crate::resilience::{ResilientExecutor, RetryPolicy};
use crate::upstream::{Connector, TransportPool, UpstreamRequest};

/// Progress reported once the background task is running.
const PROGRESS_TASK_STARTED: u8 = 10;
/// Progress reported right before the fetcher is invoked.
const PROGRESS_FETCHING: u8 = 25;
/// Progress reported once the fetcher returned successfully.
const PROGRESS_FETCHED: u8 = 90;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Model not found: {0}. Please download it first.")]
    NotFound(String),

    #[error("Model {0} is still downloading. Wait for the download to complete.")]
    DownloadInProgress(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Failed to switch model: {0}")]
    Controller(#[from] ControllerError),
}

/// Timing and probing knobs of the coordinator.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub switch_estimate: Duration,
    pub switch_restart_delay: Duration,
    pub manual_restart_delay: Duration,
    pub loading_probe: Duration,
    pub listing_policy: RetryPolicy,
    pub fetch_command: String,
}

impl LifecycleSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            switch_estimate: Duration::from_secs(config.models.switch_estimate_secs),
            switch_restart_delay: Duration::from_secs(
                config.containers.switch_restart_delay_secs,
            ),
            manual_restart_delay: Duration::from_secs(
                config.containers.manual_restart_delay_secs,
            ),
            loading_probe: Duration::from_secs(config.timeouts.loading_probe_secs),
            listing_policy: RetryPolicy::for_listing(&config.retries, &config.timeouts),
            fetch_command: config.models.fetch_command.clone(),
        }
    }
}

/// Outcome of `start_download`.
#[derive(Debug, Clone)]
pub struct DownloadStart {
    pub state: DownloadState,
    /// False when an in-flight download was reused.
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadAck {
    pub status: DownloadStatus,
    pub message: String,
    pub model_id: String,
    pub info: String,
}

impl From<&DownloadStart> for DownloadAck {
    fn from(start: &DownloadStart) -> Self {
        let model_id = start.state.model_id.clone().unwrap_or_default();
        let message = if start.started {
            format!("Download started for {model_id}")
        } else {
            format!("Download already in progress for {model_id}")
        };
        Self {
            status: start.state.status,
            message,
            model_id,
            info: "Download in progress. Check /api/download-progress for status.".to_string(),
        }
    }
}

/// Instructions returned when a download is not automated.
#[derive(Debug, Clone, Serialize)]
pub struct ManualDownload {
    pub status: &'static str,
    pub message: String,
    pub model_id: String,
    pub command: String,
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchAck {
    pub status: &'static str,
    pub message: String,
    pub model_id: String,
    pub info: &'static str,
    pub estimated_time_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartAck {
    pub status: &'static str,
    pub message: String,
    pub info: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteAck {
    pub status: &'static str,
    pub message: String,
    pub model_id: String,
}

/// Readiness phase of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingPhase {
    /// Backend lists a model.
    Ready,
    /// Backend answers but has no model yet.
    Loading,
    /// Backend unreachable.
    Starting,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadingStatus {
    pub status: LoadingPhase,
    pub model_loaded: bool,
    pub current_model: Option<String>,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub models_available: bool,
    pub models_dir_exists: bool,
    pub downloaded_models: Vec<String>,
    pub current_model: Option<String>,
    pub vllm_healthy: bool,
    pub message: &'static str,
}

pub struct ModelLifecycle<C: Connector = TransportPool> {
    downloads: Arc<DashMap<String, DownloadState>>,
    artifacts: Arc<dyn ArtifactStore>,
    controller: Arc<dyn ContainerController>,
    env_file: EnvFile,
    catalog: Arc<ModelCatalog>,
    executor: Arc<ResilientExecutor<C>>,
    settings: LifecycleSettings,
}

impl<C: Connector> ModelLifecycle<C> {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        controller: Arc<dyn ContainerController>,
        env_file: EnvFile,
        catalog: Arc<ModelCatalog>,
        executor: Arc<ResilientExecutor<C>>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            downloads: Arc::new(DashMap::new()),
            artifacts,
            controller,
            env_file,
            catalog,
            executor,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    /// Begin downloading `model_id` in the background.
    ///
    /// If a download of the same model is still running, its state is
    /// returned and nothing new is started. A finished or failed download is
    /// replaced by a fresh one at 0%.
    pub fn start_download(&self, model_id: &str) -> Result<DownloadStart, LifecycleError> {
        validate_model_id(model_id)?;

        let state = {
            let mut entry = self
                .downloads
                .entry(model_id.to_string())
                .or_insert_with(|| DownloadState::idle(Some(model_id.to_string())));
            if entry.status == DownloadStatus::Downloading {
                tracing::debug!(model_id, "Download already in flight");
                return Ok(DownloadStart {
                    state: entry.value().clone(),
                    started: false,
                });
            }
            *entry = DownloadState::started(model_id);
            entry.value().clone()
        };

        let Some(download_id) = state.download_id else {
            return Ok(DownloadStart {
                state,
                started: false,
            });
        };

        tracing::info!(model_id, %download_id, "Starting model download");
        tokio::spawn(run_download(
            self.downloads.clone(),
            self.artifacts.clone(),
            self.catalog.clone(),
            model_id.to_string(),
            download_id,
        ));

        Ok(DownloadStart {
            state,
            started: true,
        })
    }

    /// State of `model_id`, or of the most recently started download.
    pub fn get_progress(&self, model_id: Option<&str>) -> DownloadState {
        match model_id {
            Some(id) => self
                .downloads
                .get(id)
                .map(|entry| entry.value().clone())
                .unwrap_or_else(|| DownloadState::idle(Some(id.to_string()))),
            None => self
                .downloads
                .iter()
                .max_by_key(|entry| entry.started_at)
                .map(|entry| entry.value().clone())
                .unwrap_or_else(|| DownloadState::idle(None)),
        }
    }

    /// What a user would run to download `model_id` by hand.
    pub fn manual_download(&self, model_id: &str) -> Result<ManualDownload, LifecycleError> {
        validate_model_id(model_id)?;
        let command = format!("{} download {}", self.settings.fetch_command, model_id);
        Ok(ManualDownload {
            status: "manual",
            message: format!("Manual download instructions for {model_id}"),
            model_id: model_id.to_string(),
            instructions: vec![
                "Run this command on the host holding the model cache:".to_string(),
                format!("  {command}"),
                String::new(),
                "Or use auto=true to download via API:".to_string(),
                format!("  POST /api/download-model?model_id={model_id}&auto=true"),
            ],
            command,
        })
    }

    /// Make `model_id` the backend's model.
    ///
    /// Returns as soon as the backend has been recreated; loading the new
    /// weights is observed through `get_loading_status`.
    pub async fn switch_model(&self, model_id: &str) -> Result<SwitchAck, LifecycleError> {
        validate_model_id(model_id)?;
        self.ensure_not_downloading(model_id)?;
        if !self.artifacts.exists(model_id).await {
            return Err(LifecycleError::NotFound(model_id.to_string()));
        }

        self.env_file.set_default_model(model_id).await?;
        self.catalog.invalidate();

        tracing::info!(model_id, "Recreating backend for model switch");
        self.controller.recreate_backend().await.map_err(|e| {
            tracing::error!(model_id, error = %e, "Backend recreation failed");
            e
        })?;
        metrics::record_model_switch();

        self.schedule_self_restart(self.settings.switch_restart_delay);

        Ok(SwitchAck {
            status: "switching",
            message: format!("Switching to {model_id}"),
            model_id: model_id.to_string(),
            info: "vLLM is loading the new model. Check /api/model-loading-status for progress.",
            estimated_time_seconds: self.settings.switch_estimate.as_secs(),
        })
    }

    /// Restart the gateway after `delay`. Fire-and-forget.
    pub fn schedule_self_restart(&self, delay: Duration) -> RestartAck {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("Restarting gateway container to flush cached connections");
            if let Err(e) = controller.restart_self().await {
                tracing::error!(error = %e, "Failed to restart gateway container");
            }
        });
        tracing::info!(delay_secs = delay.as_secs(), "Scheduled gateway restart");

        RestartAck {
            status: "restarting",
            message: format!(
                "API will restart in {} seconds to refresh DNS cache",
                delay.as_secs()
            ),
            info: "You may need to reconnect after restart",
        }
    }

    /// Restart using the configured manual delay.
    pub fn restart_api(&self) -> RestartAck {
        self.schedule_self_restart(self.settings.manual_restart_delay)
    }

    pub async fn delete_model(&self, model_id: &str) -> Result<DeleteAck, LifecycleError> {
        validate_model_id(model_id)?;
        self.ensure_not_downloading(model_id)?;
        self.artifacts.delete(model_id).await?;
        self.catalog.invalidate();
        tracing::info!(model_id, "Model deleted");

        Ok(DeleteAck {
            status: "deleted",
            message: format!("Model {model_id} deleted successfully"),
            model_id: model_id.to_string(),
        })
    }

    /// Refuse `model_id` while its download runs. The cache directory
    /// exists before the fetch completes.
    fn ensure_not_downloading(&self, model_id: &str) -> Result<(), LifecycleError> {
        match self.downloads.get(model_id) {
            Some(entry) if entry.status == DownloadStatus::Downloading => {
                tracing::warn!(model_id, progress = entry.progress, "Model is still downloading");
                Err(LifecycleError::DownloadInProgress(model_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Probe the backend's model listing once, on a short deadline.
    pub async fn get_loading_status(&self) -> LoadingStatus {
        let request = UpstreamRequest::models();
        let policy = RetryPolicy::single(self.settings.loading_probe);

        let response = match self.executor.execute(&request, &policy).await {
            Ok(response) => response,
            Err(e) => {
                return LoadingStatus {
                    status: LoadingPhase::Starting,
                    model_loaded: false,
                    current_model: None,
                    message: "vLLM container is starting...",
                    error: Some(e.to_string()),
                }
            }
        };

        let listing = if response.status().is_success() {
            response
                .bytes()
                .await
                .map(|body| ModelListing::from_slice(&body))
                .unwrap_or_default()
        } else {
            ModelListing::default()
        };

        match listing.current() {
            Some(model) => LoadingStatus {
                status: LoadingPhase::Ready,
                model_loaded: true,
                current_model: Some(model.to_string()),
                message: "vLLM is ready",
                error: None,
            },
            None => LoadingStatus {
                status: LoadingPhase::Loading,
                model_loaded: false,
                current_model: None,
                message: "vLLM is starting up...",
                error: None,
            },
        }
    }

    /// Downloaded models plus what the backend currently serves.
    pub async fn model_status(&self) -> Result<ModelStatus, LifecycleError> {
        if !self.artifacts.root_exists().await {
            return Ok(ModelStatus {
                models_available: false,
                models_dir_exists: false,
                downloaded_models: Vec::new(),
                current_model: None,
                vllm_healthy: false,
                message: "Models directory not found. Please download a model first.",
            });
        }

        let downloaded = self.catalog.downloaded(self.artifacts.as_ref()).await?;
        let (vllm_healthy, current_model) = self.current_model().await;

        Ok(ModelStatus {
            models_available: !downloaded.is_empty(),
            models_dir_exists: true,
            message: if downloaded.is_empty() {
                "No models downloaded yet"
            } else {
                "Models found"
            },
            downloaded_models: downloaded,
            current_model,
            vllm_healthy,
        })
    }

    async fn current_model(&self) -> (bool, Option<String>) {
        let request = UpstreamRequest::models();
        match self
            .executor
            .execute(&request, &self.settings.listing_policy)
            .await
        {
            Ok(response) if response.status().is_success() => {
                let listing = response
                    .bytes()
                    .await
                    .map(|body| ModelListing::from_slice(&body))
                    .unwrap_or_default();
                (true, listing.current().map(str::to_string))
            }
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Model listing refused");
                (false, None)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to query backend for current model");
                (false, None)
            }
        }
    }
}

/// Apply `update` to the entry only while it still belongs to `download_id`.
fn update_owned<F>(
    downloads: &DashMap<String, DownloadState>,
    model_id: &str,
    download_id: Uuid,
    update: F,
) where
    F: FnOnce(&mut DownloadState),
{
    if let Some(mut entry) = downloads.get_mut(model_id) {
        if entry.download_id == Some(download_id) {
            update(&mut entry);
        }
    }
}

async fn run_download(
    downloads: Arc<DashMap<String, DownloadState>>,
    artifacts: Arc<dyn ArtifactStore>,
    catalog: Arc<ModelCatalog>,
    model_id: String,
    download_id: Uuid,
) {
    update_owned(&downloads, &model_id, download_id, |s| {
        s.advance(PROGRESS_TASK_STARTED);
    });
    update_owned(&downloads, &model_id, download_id, |s| {
        s.advance(PROGRESS_FETCHING);
    });

    match artifacts.fetch(&model_id).await {
        Ok(()) => {
            update_owned(&downloads, &model_id, download_id, |s| {
                s.advance(PROGRESS_FETCHED);
                s.complete();
            });
            catalog.invalidate();
            metrics::record_download("complete");
            tracing::info!(model_id = %model_id, "Download complete");
        }
        Err(e) => {
            let message = e.to_string();
            update_owned(&downloads, &model_id, download_id, |s| {
                s.fail(message.clone());
            });
            metrics::record_download("error");
            tracing::error!(model_id = %model_id, error = %message, "Download failed");
        }
    }
}
