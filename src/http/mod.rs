//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace span, CORS, logging, body limit)
//!     → middleware/auth.rs (bearer token, /api routes except healthz)
//!     → security::rate_limit (chat only)
//!     → handlers.rs (extract, call facade)
//!     → response.rs (buffered passthrough or event stream)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;

pub use server::{build_router, AppState, GatewayServer, X_REQUEST_ID};
