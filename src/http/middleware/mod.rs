//! Request middleware.
//!
//! - `auth`: bearer-token check for the protected `/api` routes
//! - `logging`: one completion line per request, level by status

pub mod auth;
pub mod logging;

pub use auth::require_bearer;
pub use logging::logging_middleware;
