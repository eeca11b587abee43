//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (pick the deadline tier for the call)
//!     → retries.rs (attempt 1 on the pooled client,
//!                   attempts 2..N on fresh clients after a fixed delay)
//!     → response returned as soon as one arrives, whatever its status
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - An attempt's deadline ends when response headers arrive; body reads
//!   are bounded per read, so streams may run past it
//! - Only transport failures are retried; HTTP error statuses are answers
//! - Retries use a fixed delay: the failure mode is a restarting backend,
//!   not an overloaded one
//! - Every call site shares one executor and supplies only a `RetryPolicy`

pub mod retries;
pub mod timeouts;

pub use retries::{ResilientExecutor, RetryPolicy};
pub use timeouts::TimeoutTier;
