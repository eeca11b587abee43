//! LLM inference gateway library.
//!
//! Proxies an OpenAI-compatible backend with connection-failure
//! resilience, relays streamed completions, and drives model download,
//! switch and restart operations on the backend's behalf.

// Outbound path
pub mod resilience;
pub mod streaming;
pub mod upstream;

// Model operations
pub mod containers;
pub mod models;

// Inbound surface
pub mod error;
pub mod gateway;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
