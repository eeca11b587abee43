//! Upstream backend access subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway facade builds an UpstreamRequest (request.rs)
//!     → resilience::retries picks a handle per attempt
//!     → transport.rs (pooled client on attempt 1, fresh client afterwards)
//!     → upstream backend
//!     → error.rs classifies transport failures (retryable or not)
//! ```
//!
//! # Design Decisions
//! - One upstream base URL; only chat completions, model listing and the
//!   metrics scrape are ever addressed
//! - The pooled client is owned by `TransportPool`, not a global
//! - A response that arrived is never an error at this layer, whatever its status

pub mod error;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use request::{UpstreamRequest, UpstreamTarget};
pub use transport::{Connector, TransportHandle, TransportPool, TransportSettings};
