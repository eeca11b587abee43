//! Durable "current default model" record.
//!
//! The backend container reads `DEFAULT_MODEL` from a dotenv-style file at
//! startup; switching models rewrites that single line.

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_MODEL_KEY: &str = "DEFAULT_MODEL";

#[derive(Debug, Error)]
#[error("failed to update {path}: {source}")]
pub struct PersistError {
    path: String,
    #[source]
    source: std::io::Error,
}

pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Rewrite (or append) the `DEFAULT_MODEL` line.
    ///
    /// Returns `Ok(false)` without touching anything when the file does not
    /// exist: the deployment is not managed through an env file.
    pub async fn set_default_model(&self, model_id: &str) -> Result<bool, PersistError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Env file not found, default model not persisted");
                return Ok(false);
            }
            Err(e) => return Err(self.error(e)),
        };

        let updated = replace_default_model(&content, model_id);
        tokio::fs::write(&self.path, updated)
            .await
            .map_err(|e| self.error(e))?;

        tracing::info!(model_id, "Updated DEFAULT_MODEL");
        Ok(true)
    }

    fn error(&self, source: std::io::Error) -> PersistError {
        PersistError {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn replace_default_model(content: &str, model_id: &str) -> String {
    let prefix = format!("{DEFAULT_MODEL_KEY}=");
    let new_line = format!("{prefix}{model_id}");
    let mut replaced = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if !replaced && line.starts_with(&prefix) {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(new_line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
