//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Model switch:
//!     env_file.rs rewrites DEFAULT_MODEL for the backend container
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Secrets can come from the environment instead of the file
//! - Validation separates syntactic (serde) from semantic checks

pub mod env_file;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env_file::EnvFile;
pub use loader::{load, load_config, ConfigError};
pub use schema::{
    AuthConfig, ContainersConfig, GatewayConfig, ListenerConfig, ModelsConfig, RateLimitConfig,
    RetryConfig, TimeoutConfig, UpstreamConfig,
};
