//! Shared API types

pub mod error;
pub mod json;
pub mod quota;

pub use error::{ApiError, ApiErrorResponse};
pub use json::Json;
pub use quota::{apply_quota_headers, WithQuota};
