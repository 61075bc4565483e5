//! Rate limit response headers

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::domain::quota::QuotaDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_RATELIMIT_DEGRADED: HeaderName = HeaderName::from_static("x-ratelimit-degraded");

/// Write the quota decision into response headers
pub fn apply_quota_headers(headers: &mut HeaderMap, decision: &QuotaDecision) {
    let status = decision.status();

    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(status.reset_epoch_secs()));

    if let Some(retry_after) = decision.retry_after() {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }

    if decision.is_degraded() {
        headers.insert(X_RATELIMIT_DEGRADED, HeaderValue::from_static("true"));
    }
}

/// Response body paired with the quota decision of its request
#[derive(Debug)]
pub struct WithQuota<T> {
    pub body: T,
    pub quota: Option<QuotaDecision>,
}

impl<T> WithQuota<T> {
    pub fn new(body: T, quota: Option<QuotaDecision>) -> Self {
        Self { body, quota }
    }
}

impl<T: IntoResponse> IntoResponse for WithQuota<T> {
    fn into_response(self) -> Response {
        let mut response = self.body.into_response();

        if let Some(decision) = &self.quota {
            apply_quota_headers(response.headers_mut(), decision);
        }

        response
    }
}
