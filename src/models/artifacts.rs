//! Model artifact storage.
//!
//! # Responsibilities
//! - Fetch model weights into the local hub cache
//! - Answer whether a model is fully on disk
//! - Delete and enumerate cached models
//!
//! # Design Decisions
//! - The coordinator only sees the `ArtifactStore` trait
//! - `HubCacheStore` follows the HuggingFace hub cache layout
//!   (`models--<org>--<name>`) and delegates the transfer to an external
//!   download command
//! - Model ids are validated before they are turned into paths

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::schema::ModelsConfig;

/// Errors raised by artifact operations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("invalid model id: {0}")]
    InvalidId(String),

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where model weights live and how they get there.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download `model_id` completely. Long-running.
    async fn fetch(&self, model_id: &str) -> Result<(), ArtifactError>;

    /// Whether `model_id` is present on disk.
    async fn exists(&self, model_id: &str) -> bool;

    /// Remove `model_id` from disk.
    async fn delete(&self, model_id: &str) -> Result<(), ArtifactError>;

    /// Ids of every model present on disk.
    async fn list(&self) -> Result<Vec<String>, ArtifactError>;

    /// Whether the storage root itself exists.
    async fn root_exists(&self) -> bool;
}

/// Directory name of a model inside the hub cache.
pub fn cache_dir_name(model_id: &str) -> String {
    format!("models--{}", model_id.replace('/', "--"))
}

/// Inverse of [`cache_dir_name`]; `None` for unrelated entries.
pub fn model_id_from_dir(name: &str) -> Option<String> {
    let rest = name.strip_prefix("models--")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.replacen("--", "/", 1))
}

/// Reject ids that could escape the cache directory.
pub fn validate_model_id(model_id: &str) -> Result<(), ArtifactError> {
    let valid = !model_id.is_empty()
        && !model_id.starts_with('/')
        && !model_id.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        && model_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidId(model_id.to_string()))
    }
}

/// HuggingFace hub cache on the local filesystem.
pub struct HubCacheStore {
    hub_dir: PathBuf,
    fetch_command: String,
    hf_token: Option<String>,
}

impl HubCacheStore {
    pub fn new(hub_dir: impl Into<PathBuf>, fetch_command: impl Into<String>) -> Self {
        Self {
            hub_dir: hub_dir.into(),
            fetch_command: fetch_command.into(),
            hf_token: None,
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self {
            hub_dir: PathBuf::from(&config.hub_dir),
            fetch_command: config.fetch_command.clone(),
            hf_token: config.hf_token.clone(),
        }
    }

    fn model_path(&self, model_id: &str) -> Result<PathBuf, ArtifactError> {
        validate_model_id(model_id)?;
        Ok(self.hub_dir.join(cache_dir_name(model_id)))
    }
}

#[async_trait]
impl ArtifactStore for HubCacheStore {
    async fn fetch(&self, model_id: &str) -> Result<(), ArtifactError> {
        validate_model_id(model_id)?;
        tokio::fs::create_dir_all(&self.hub_dir).await?;

        tracing::info!(model_id, command = %self.fetch_command, "Fetching model artifacts");

        let mut command = Command::new(&self.fetch_command);
        command
            .arg("download")
            .arg(model_id)
            .env("HF_HUB_CACHE", &self.hub_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(token) = &self.hf_token {
            command.env("HF_TOKEN", token);
        }

        let output = command
            .output()
            .await
            .map_err(|e| ArtifactError::Fetch(format!("{}: {e}", self.fetch_command)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            Err(ArtifactError::Fetch(format!(
                "{} exited with {}: {}",
                self.fetch_command, output.status, detail
            )))
        }
    }

    async fn exists(&self, model_id: &str) -> bool {
        match self.model_path(model_id) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete(&self, model_id: &str) -> Result<(), ArtifactError> {
        let path = self.model_path(model_id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ArtifactError::NotFound(model_id.to_string()));
        }

        tracing::info!(model_id, path = %path.display(), "Deleting model");
        tokio::fs::remove_dir_all(&path).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, ArtifactError> {
        let mut models = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.hub_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(models),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = model_id_from_dir(&entry.file_name().to_string_lossy()) {
                models.push(id);
            }
        }
        models.sort();
        Ok(models)
    }

    async fn root_exists(&self) -> bool {
        tokio::fs::try_exists(&self.hub_dir).await.unwrap_or(false)
    }
}
