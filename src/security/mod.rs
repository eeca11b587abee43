//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api request:
//!     → rate_limit.rs (per-IP token bucket)
//!     → http::middleware::auth (bearer token)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Limits are keyed by client IP; buckets of idle clients are swept
//!   periodically so the table stays bounded

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};
