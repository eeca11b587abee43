//! Model lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! download-model ─▶ ModelLifecycle::start_download ─▶ ArtifactStore::fetch (background)
//! switch-model   ─▶ ModelLifecycle::switch_model   ─▶ EnvFile + ContainerController
//! model-status   ─▶ ModelCatalog (TTL) + upstream listing
//! ```
//!
//! # Design Decisions
//! - State is in-memory only and lives as long as the process
//! - Artifact storage and container control sit behind traits so the
//!   coordinator can be tested without docker or a model hub

pub mod artifacts;
pub mod catalog;
pub mod coordinator;
pub mod listing;
pub mod state;

pub use artifacts::{ArtifactError, ArtifactStore, HubCacheStore};
pub use catalog::ModelCatalog;
pub use coordinator::{LifecycleError, LifecycleSettings, ModelLifecycle};
pub use listing::ModelListing;
pub use state::{DownloadState, DownloadStatus};
