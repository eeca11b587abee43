//! Cached listing of downloaded models.
//!
//! Scanning the artifact store walks the filesystem, so the result is kept
//! for a TTL and dropped whenever a switch, delete or completed download
//! changes what is on disk.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::artifacts::{ArtifactError, ArtifactStore};

pub struct ModelCatalog {
    ttl: Duration,
    cached: Mutex<Option<(Instant, Vec<String>)>>,
}

impl ModelCatalog {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached listing, rescanning `store` when stale or empty.
    pub async fn downloaded(&self, store: &dyn ArtifactStore) -> Result<Vec<String>, ArtifactError> {
        if let Some(models) = self.fresh_entry() {
            return Ok(models);
        }

        tracing::debug!("Scanning downloaded models");
        let models = store.list().await?;
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((Instant::now(), models.clone()));
        }
        Ok(models)
    }

    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
        tracing::debug!("Model catalog invalidated");
    }

    fn fresh_entry(&self) -> Option<Vec<String>> {
        let cached = self.cached.lock().ok()?;
        match cached.as_ref() {
            Some((at, models)) if at.elapsed() < self.ttl => Some(models.clone()),
            _ => None,
        }
    }
}
