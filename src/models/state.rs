//! Download state machine.
//!
//! # States
//! - Idle: nothing requested (placeholder only, never stored)
//! - Downloading: background fetch in flight
//! - Complete: artifact on disk
//! - Error: fetch failed, message captured
//!
//! # State Transitions
//! ```text
//! Idle → Downloading: start_download
//! Downloading → Complete: fetcher succeeded (progress = 100)
//! Downloading → Error: fetcher failed (progress kept)
//! Complete | Error → (replaced by a new Downloading entry)
//! ```
//!
//! # Design Decisions
//! - Progress only moves forward within one download
//! - A new download replaces the entry wholesale; it is not a transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle label of a model download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Idle,
    Downloading,
    Complete,
    Error,
}

impl DownloadStatus {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Complete | DownloadStatus::Error)
    }

    /// Forward edges of the state machine.
    pub fn can_transition_to(self, next: DownloadStatus) -> bool {
        matches!(
            (self, next),
            (DownloadStatus::Idle, DownloadStatus::Downloading)
                | (DownloadStatus::Downloading, DownloadStatus::Complete)
                | (DownloadStatus::Downloading, DownloadStatus::Error)
        )
    }
}

/// Poll-able state of one model's most recent download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadState {
    #[serde(rename = "model")]
    pub model_id: Option<String>,
    pub status: DownloadStatus,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Identifies the background task that owns this entry.
    #[serde(skip)]
    pub download_id: Option<Uuid>,
}

impl DownloadState {
    /// Placeholder for a model (or nothing) that has never been requested.
    pub fn idle(model_id: Option<String>) -> Self {
        Self {
            model_id,
            status: DownloadStatus::Idle,
            progress: 0,
            started_at: None,
            error: None,
            download_id: None,
        }
    }

    /// A download that has just been accepted.
    pub fn started(model_id: &str) -> Self {
        Self {
            model_id: Some(model_id.to_string()),
            status: DownloadStatus::Downloading,
            progress: 0,
            started_at: Some(Utc::now()),
            error: None,
            download_id: Some(Uuid::new_v4()),
        }
    }

    /// Move progress forward. Ignored unless downloading; never decreases.
    pub fn advance(&mut self, progress: u8) -> bool {
        if self.status != DownloadStatus::Downloading {
            return false;
        }
        let progress = progress.min(100);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub fn complete(&mut self) -> bool {
        if !self.status.can_transition_to(DownloadStatus::Complete) {
            return false;
        }
        self.status = DownloadStatus::Complete;
        self.progress = 100;
        true
    }

    /// Record a failure. Progress stays at its last value.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.status.can_transition_to(DownloadStatus::Error) {
            return false;
        }
        self.status = DownloadStatus::Error;
        self.error = Some(message.into());
        true
    }
}
