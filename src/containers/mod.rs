//! Container control subsystem.
//!
//! # Data Flow
//! ```text
//! switch_model / restart-api
//!     → ContainerController::recreate_backend (awaited, errors surface as 500)
//!     → ContainerController::restart_self (spawned after a delay, errors logged)
//! ```
//!
//! # Design Decisions
//! - The coordinator depends on the trait only; compose.rs is the
//!   production implementation
//! - Backend recreation goes through `docker compose` so the service keeps
//!   its network and picks up the new environment
//! - Restart delays belong to the caller, not the controller

pub mod compose;

use async_trait::async_trait;
use thiserror::Error;

pub use compose::ComposeController;

/// Errors raised while driving the container runtime.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{command} timed out after {secs}s; the container may still be restarting")]
    TimedOut { command: String, secs: u64 },
}

/// Opaque control over the backend and gateway containers.
#[async_trait]
pub trait ContainerController: Send + Sync {
    /// Recreate the inference backend so it reloads its configuration.
    async fn recreate_backend(&self) -> Result<(), ControllerError>;

    /// Restart the gateway's own container.
    async fn restart_self(&self) -> Result<(), ControllerError>;
}
