//! Per-request orchestration: token, role, quota, then cache-aside resolve

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::analytics::{AnalyticsQuery, Resolver};
use crate::domain::gateway::{GatewayError, RoutePolicy};
use crate::domain::quota::QuotaDecision;
use crate::domain::token::TokenClaims;
use crate::infrastructure::auth::TokenService;
use crate::infrastructure::cache::CacheLayer;
use crate::infrastructure::quota::QuotaEnforcer;

/// A request that passed authentication, authorization and quota
#[derive(Debug, Clone)]
pub struct Admission {
    /// Absent on public routes
    pub claims: Option<TokenClaims>,
    pub quota: Option<QuotaDecision>,
}

/// Resolved value plus the quota metadata to attach to the response
#[derive(Debug, Clone)]
pub struct GatewayResponse<T> {
    pub value: T,
    pub quota: Option<QuotaDecision>,
}

/// Rejection plus any quota decision made before it
#[derive(Debug)]
pub struct GatewayRejection {
    pub error: GatewayError,
    pub quota: Option<QuotaDecision>,
}

impl GatewayRejection {
    fn before_quota(error: impl Into<GatewayError>) -> Self {
        Self {
            error: error.into(),
            quota: None,
        }
    }
}

impl fmt::Display for GatewayRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

/// Bearer credential from the `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, GatewayError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| GatewayError::InvalidToken("Authorization header is not valid ASCII".into()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| GatewayError::InvalidToken("Expected 'Bearer <token>'".into()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GatewayError::InvalidToken(format!(
            "Unsupported authorization scheme '{}'",
            scheme
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }

    Ok(Some(token))
}

/// Gate in front of the analytics resolver
///
/// Built once at startup and shared through the application state.
#[derive(Debug, Clone)]
pub struct GatewayMiddleware {
    tokens: Arc<dyn TokenService>,
    quota: QuotaEnforcer,
    cache: CacheLayer,
    cache_ttl: Duration,
}

impl GatewayMiddleware {
    pub fn new(
        tokens: Arc<dyn TokenService>,
        quota: QuotaEnforcer,
        cache: CacheLayer,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            tokens,
            quota,
            cache,
            cache_ttl,
        }
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn tokens(&self) -> &Arc<dyn TokenService> {
        &self.tokens
    }

    pub fn quota(&self) -> &QuotaEnforcer {
        &self.quota
    }

    /// Authenticate, authorize and count a request
    ///
    /// Authentication failures never touch the quota counter.
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        policy: RoutePolicy,
    ) -> Result<Admission, GatewayRejection> {
        if policy.is_public() {
            return Ok(Admission {
                claims: None,
                quota: None,
            });
        }

        let token = bearer_token(headers)
            .map_err(GatewayRejection::before_quota)?
            .ok_or_else(|| GatewayRejection::before_quota(GatewayError::Unauthenticated))?;

        let claims = self
            .tokens
            .verify_access(token)
            .map_err(GatewayRejection::before_quota)?;

        if let Some(required) = policy.required_role() {
            if !claims.has_role(required) {
                debug!(client_id = %claims.sub, role = %required, "Missing required role");
                return Err(GatewayRejection::before_quota(
                    GatewayError::InsufficientPermissions { required },
                ));
            }
        }

        let decision = self.quota.check(&claims.sub, claims.quota).await;

        if let Some(retry_after) = decision.retry_after() {
            info!(
                client_id = %claims.sub,
                limit = decision.status().limit,
                retry_after,
                event = "rate_limited",
                "Request rejected by quota"
            );
            return Err(GatewayRejection {
                error: GatewayError::RateLimitExceeded { retry_after },
                quota: Some(decision),
            });
        }

        Ok(Admission {
            claims: Some(claims),
            quota: Some(decision),
        })
    }

    /// Admit the request, then answer it from cache or the resolver
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        policy: RoutePolicy,
        query: &AnalyticsQuery,
        resolver: &dyn Resolver,
    ) -> Result<GatewayResponse<Value>, GatewayRejection> {
        let admission = self.admit(headers, policy).await?;

        let value = self
            .cache
            .get_or_compute(&query.cache_key(), self.cache_ttl, || resolver.resolve(query))
            .await
            .map_err(|e| GatewayRejection {
                error: GatewayError::Upstream(e),
                quota: admission.quota.clone(),
            })?;

        Ok(GatewayResponse {
            value,
            quota: admission.quota,
        })
    }
}
