//! Credential exchange endpoints
//!
//! A long-lived client credential is exchanged for a short-lived access token and
//! a refresh token. Verification keys are published as a JWKS document.

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Router};
use serde::Deserialize;
use tracing::{error, info};

use crate::api::middleware::api_key_from_headers;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::gateway::GatewayError;
use crate::domain::token::{RefreshedAccessToken, TokenError, TokenPair};
use crate::infrastructure::auth::{JwkSet, TokenService};

/// Create the authentication router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/token", post(issue_token))
        .route("/refresh", post(refresh_token))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

fn token_error(err: TokenError) -> ApiError {
    match err {
        TokenError::Signing(message) => {
            error!(error = %message, "Failed to sign token");
            ApiError::internal("Failed to issue token")
        }
        other => GatewayError::from(other).into(),
    }
}

/// Credential from `X-API-Key`, falling back to a JSON `{"api_key": ...}` body
fn presented_credential(headers: &HeaderMap, body: &Bytes) -> Result<String, ApiError> {
    if let Some(key) = api_key_from_headers(headers)? {
        return Ok(key);
    }

    if body.is_empty() {
        return Err(GatewayError::Unauthenticated.into());
    }

    let request: TokenRequest = serde_json::from_slice(body).map_err(|e| {
        ApiError::bad_request(format!("Invalid JSON data: {}", e)).with_code("json_parse_error")
    })?;

    Ok(request.api_key)
}

/// POST /auth/token
pub async fn issue_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenPair>, ApiError> {
    let credential = presented_credential(&headers, &body)?;

    let client = state
        .credential_service
        .authenticate(&credential)
        .await?
        .ok_or(GatewayError::UnknownCredential)?;

    let pair = state
        .gateway
        .tokens()
        .issue_token_pair(&client)
        .map_err(token_error)?;

    info!(
        client_id = %client.id(),
        tier = %client.tier(),
        event = "token_issued",
        "Issued token pair"
    );

    Ok(Json(pair))
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshedAccessToken>, ApiError> {
    let refreshed = state
        .gateway
        .tokens()
        .refresh(request.refresh_token.trim())
        .map_err(token_error)?;

    info!(client_id = %refreshed.claims.sub, event = "token_refreshed", "Refreshed access token");

    Ok(Json(refreshed))
}

/// GET /.well-known/jwks.json
pub async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    Json(state.gateway.tokens().public_jwks())
}
