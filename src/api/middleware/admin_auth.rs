//! Admin authentication
//!
//! Allows either:
//! - A Bearer access token carrying the `admin` role
//! - The bootstrap admin's `X-API-Key` credential
//!
//! Other clients must exchange their key for a token, so admin calls stay
//! under their quota.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::client::Role;
use crate::domain::gateway::{GatewayError, RoutePolicy};
use crate::domain::quota::QuotaDecision;
use crate::BOOTSTRAP_ADMIN_ID;

use super::auth::api_key_from_headers;

/// How the admin caller proved its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminPrincipal {
    Token { client_id: String },
    ApiKey { client_id: String },
}

impl AdminPrincipal {
    pub fn identifier(&self) -> String {
        match self {
            Self::Token { client_id } => format!("token:{}", client_id),
            Self::ApiKey { client_id } => format!("api_key:{}", client_id),
        }
    }
}

/// Extractor that requires admin access
///
/// Token callers are counted against their quota like any gated request; the
/// decision is kept so handlers can report it.
#[derive(Debug, Clone)]
pub struct RequireAdmin {
    pub principal: AdminPrincipal,
    pub quota: Option<QuotaDecision>,
}

impl RequireAdmin {
    /// Error carrying this request's quota decision
    pub fn error(&self, err: impl Into<ApiError>) -> ApiError {
        err.into().with_quota(self.quota.clone())
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(credential) = api_key_from_headers(&parts.headers)? {
            let client = state
                .credential_service
                .authenticate(&credential)
                .await?
                .ok_or(GatewayError::UnknownCredential)?;

            if client.id().as_str() != BOOTSTRAP_ADMIN_ID {
                debug!(client_id = %client.id(), "Rejected admin API key from non-bootstrap client");
                return Err(GatewayError::Unauthenticated.into());
            }

            if !client.effective_roles().contains(&Role::Admin) {
                return Err(GatewayError::InsufficientPermissions {
                    required: Role::Admin,
                }
                .into());
            }

            debug!(client_id = %client.id(), "Admin access via API key");
            return Ok(Self {
                principal: AdminPrincipal::ApiKey {
                    client_id: client.id().to_string(),
                },
                quota: None,
            });
        }

        let admission = state
            .gateway
            .admit(&parts.headers, RoutePolicy::requires(Role::Admin))
            .await?;

        let client_id = admission
            .claims
            .map(|claims| claims.sub)
            .unwrap_or_default();

        debug!(client_id = %client_id, "Admin access via token");
        Ok(Self {
            principal: AdminPrincipal::Token { client_id },
            quota: admission.quota,
        })
    }
}
