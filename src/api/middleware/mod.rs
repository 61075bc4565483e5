//! API middleware components

pub mod admin_auth;
pub mod auth;
pub mod logging;
pub mod metrics;

pub use admin_auth::{AdminPrincipal, RequireAdmin};
pub use auth::api_key_from_headers;
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
