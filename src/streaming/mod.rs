//! Server-sent event relaying.
//!
//! # Data Flow
//! ```text
//! upstream response body (bytes, arbitrary chunking)
//!     → relay.rs splits into lines
//!     → `data: ` lines re-framed as `<line>\n\n`, everything else dropped
//!     → downstream response body, in arrival order
//!     → stops after `data: [DONE]`; faults become one error frame
//! ```
//!
//! # Design Decisions
//! - Forward-only, single pass, no buffering beyond one partial line
//! - The upstream body is dropped (its connection closed) the moment the
//!   relay finishes, on every path including downstream disconnect

pub mod relay;

pub use relay::{relay, DATA_PREFIX, DONE_FRAME};
