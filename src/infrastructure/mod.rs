//! Infrastructure layer - External service implementations

pub mod analytics;
pub mod auth;
pub mod cache;
pub mod client;
pub mod gateway;
pub mod observability;
pub mod quota;
