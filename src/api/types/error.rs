//! API error types and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::gateway::GatewayError;
use crate::domain::quota::QuotaDecision;
use crate::domain::DomainError;
use crate::infrastructure::gateway::GatewayRejection;

use super::quota::apply_quota_headers;

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    AuthenticationError,
    PermissionError,
    NotFoundError,
    ConflictError,
    RateLimitError,
    ServerError,
    ServiceUnavailableError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::AuthenticationError => write!(f, "authentication_error"),
            Self::PermissionError => write!(f, "permission_error"),
            Self::NotFoundError => write!(f, "not_found_error"),
            Self::ConflictError => write!(f, "conflict_error"),
            Self::RateLimitError => write!(f, "rate_limit_error"),
            Self::ServerError => write!(f, "server_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Seconds until the quota window resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// API error with status code and any quota decision made for the request
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
    pub quota: Option<QuotaDecision>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error_type: ApiErrorType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    param: None,
                    code: None,
                    retry_after: None,
                },
            },
            quota: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.response.error.param = Some(param.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn with_quota(mut self, quota: Option<QuotaDecision>) -> Self {
        self.quota = quota;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ApiErrorType::AuthenticationError, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, ApiErrorType::PermissionError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiErrorType::ConflictError, message)
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            ApiErrorType::RateLimitError,
            format!("Rate limit exceeded. Retry after {} seconds", retry_after),
        )
        .with_code("rate_limit_exceeded");
        err.response.error.retry_after = Some(retry_after);
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(decision) = &self.quota {
            apply_quota_headers(response.headers_mut(), decision);
        }

        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::InvalidId { message } => Self::bad_request(message).with_param("id"),
            DomainError::Conflict { message } => Self::conflict(message),
            DomainError::Unsupported { message } => Self::bad_request(message),
            DomainError::Resolver { message } => {
                error!(error = %message, "Resolver failed");
                Self::unavailable("Analytics backend unavailable").with_code("resolver_unavailable")
            }
            DomainError::Configuration { .. }
            | DomainError::Internal { .. }
            | DomainError::Storage { .. }
            | DomainError::Cache { .. } => {
                error!(error = %err, "Request failed");
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let code = err.code();

        match err {
            GatewayError::Unauthenticated
            | GatewayError::InvalidToken(_)
            | GatewayError::TokenExpired
            | GatewayError::UnknownCredential => Self::unauthorized(err.to_string()).with_code(code),
            GatewayError::InsufficientPermissions { .. } => {
                Self::forbidden(err.to_string()).with_code(code)
            }
            GatewayError::RateLimitExceeded { retry_after } => Self::rate_limited(retry_after),
            GatewayError::Upstream(domain) => Self::from(domain),
        }
    }
}

impl From<GatewayRejection> for ApiError {
    fn from(rejection: GatewayRejection) -> Self {
        Self::from(rejection.error).with_quota(rejection.quota)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::client::Role;
    use crate::domain::quota::QuotaWindow;
    use std::time::Duration;

    #[test]
    fn test_api_error_with_param() {
        let err = ApiError::bad_request("Invalid value")
            .with_param("page")
            .with_code("invalid_type");

        assert_eq!(err.response.error.param, Some("page".to_string()));
        assert_eq!(err.response.error.code, Some("invalid_type".to_string()));
    }

    #[test]
    fn test_domain_error_conversion() {
        let api_err: ApiError = DomainError::not_found("Client not found").into();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);

        let api_err: ApiError = DomainError::conflict("exists").into();
        assert_eq!(api_err.status, StatusCode::CONFLICT);

        let api_err: ApiError = DomainError::resolver("backend down").into();
        assert_eq!(api_err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_store_errors_are_not_surfaced() {
        let api_err: ApiError = DomainError::storage("connection to 10.0.0.3 refused").into();

        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_err.response.error.message.contains("10.0.0.3"));
    }

    #[test]
    fn test_gateway_error_codes() {
        let cases = [
            (GatewayError::Unauthenticated, StatusCode::UNAUTHORIZED, "unauthenticated"),
            (GatewayError::InvalidToken("bad".into()), StatusCode::UNAUTHORIZED, "invalid_token"),
            (GatewayError::TokenExpired, StatusCode::UNAUTHORIZED, "token_expired"),
            (GatewayError::UnknownCredential, StatusCode::UNAUTHORIZED, "invalid_credentials"),
            (
                GatewayError::InsufficientPermissions { required: Role::Admin },
                StatusCode::FORBIDDEN,
                "insufficient_permissions",
            ),
            (
                GatewayError::RateLimitExceeded { retry_after: 12 },
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
            ),
        ];

        for (gateway_err, status, code) in cases {
            let api_err = ApiError::from(gateway_err);
            assert_eq!(api_err.status, status);
            assert_eq!(api_err.response.error.code.as_deref(), Some(code));
        }
    }

    #[test]
    fn test_invalid_credentials_message() {
        let api_err = ApiError::from(GatewayError::UnknownCredential);
        assert_eq!(api_err.response.error.message, "Invalid credentials");
    }

    #[test]
    fn test_rate_limit_serialization() {
        let err = ApiError::rate_limited(30);
        let json = serde_json::to_value(&err.response).unwrap();

        assert_eq!(json["error"]["type"], "rate_limit_error");
        assert_eq!(json["error"]["retry_after"], 30);
    }

    #[test]
    fn test_rejection_response_carries_quota_headers() {
        let window = QuotaWindow::containing(0, Duration::from_secs(60));
        let rejection = GatewayRejection {
            error: GatewayError::RateLimitExceeded { retry_after: 60 },
            quota: Some(QuotaDecision::from_count(11, 10, &window, 0)),
        };

        let response = ApiError::from(rejection).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["retry-after"], "60");
    }
}
