//! Client management admin endpoints

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use crate::api::middleware::RequireAdmin;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, WithQuota};
use crate::domain::client::{ClientId, ClientIdentity, ClientStatus, Tier, MAX_DISPLAY_NAME_LENGTH};

const MAX_QUOTA_OVERRIDE: u32 = 10_000_000;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListClientsParams {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTierRequest {
    pub tier: String,
}

/// `null` clears the override
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuotaRequest {
    #[validate(range(max = 10_000_000))]
    pub quota: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: String,
    pub display_name: String,
    pub tier: Tier,
    pub status: ClientStatus,
    /// Roles in effect, after status is applied
    pub roles: Vec<String>,
    /// Requests per window in effect
    pub quota_per_window: u32,
    pub quota_override: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
    pub last_used_at: Option<String>,
}

impl From<&ClientIdentity> for ClientResponse {
    fn from(client: &ClientIdentity) -> Self {
        Self {
            id: client.id().to_string(),
            display_name: client.display_name().to_string(),
            tier: client.tier(),
            status: client.status(),
            roles: client
                .effective_roles()
                .iter()
                .map(|role| role.as_str().to_string())
                .collect(),
            quota_per_window: client.effective_quota(),
            quota_override: client.quota_override(),
            created_at: client.created_at().to_rfc3339(),
            updated_at: client.updated_at().to_rfc3339(),
            last_used_at: client.last_used_at().map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Client plus its plaintext credential, only returned on creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedClientResponse {
    #[serde(flatten)]
    pub client: ClientResponse,
    pub credential: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListClientsResponse {
    pub clients: Vec<ClientResponse>,
    pub total: usize,
}

fn parse_client_id(admin: &RequireAdmin, id: String) -> Result<ClientId, ApiError> {
    ClientId::new(id).map_err(|e| admin.error(ApiError::bad_request(e.to_string()).with_param("id")))
}

fn parse_tier(admin: &RequireAdmin, tier: &str) -> Result<Tier, ApiError> {
    Tier::from_str(tier)
        .map_err(|e| admin.error(ApiError::bad_request(e.to_string()).with_param("tier")))
}

/// GET /admin/clients
pub async fn list_clients(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Query(params): Query<ListClientsParams>,
) -> Result<WithQuota<Json<ListClientsResponse>>, ApiError> {
    debug!(admin = %admin.principal.identifier(), "Listing clients");

    let status = params
        .status
        .as_deref()
        .map(ClientStatus::from_str)
        .transpose()
        .map_err(|_| admin.error(ApiError::bad_request("status must be 'active' or 'suspended'").with_param("status")))?;

    let clients = state
        .credential_service
        .list(status)
        .await
        .map_err(|e| admin.error(e))?;

    let clients: Vec<ClientResponse> = clients.iter().map(ClientResponse::from).collect();
    let total = clients.len();

    Ok(WithQuota::new(
        Json(ListClientsResponse { clients, total }),
        admin.quota,
    ))
}

/// POST /admin/clients
pub async fn create_client(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Json(request): Json<CreateClientRequest>,
) -> Result<WithQuota<(StatusCode, Json<CreatedClientResponse>)>, ApiError> {
    request
        .validate()
        .map_err(|_| {
            admin.error(
                ApiError::bad_request(format!(
                    "display_name must be between 1 and {} characters",
                    MAX_DISPLAY_NAME_LENGTH
                ))
                .with_param("display_name"),
            )
        })?;

    let tier = match request.tier.as_deref() {
        Some(tier) => parse_tier(&admin, tier)?,
        None => Tier::default(),
    };

    let created = state
        .credential_service
        .create_client(&request.display_name, tier)
        .await
        .map_err(|e| admin.error(e))?;

    info!(
        admin = %admin.principal.identifier(),
        client_id = %created.client.id(),
        tier = %tier,
        "Client created via admin API"
    );

    Ok(WithQuota::new(
        (
            StatusCode::CREATED,
            Json(CreatedClientResponse {
                client: ClientResponse::from(&created.client),
                credential: created.credential,
            }),
        ),
        admin.quota,
    ))
}

/// GET /admin/clients/{id}
pub async fn get_client(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    let id = parse_client_id(&admin, id)?;

    let client = state
        .credential_service
        .get(&id)
        .await
        .map_err(|e| admin.error(e))?
        .ok_or_else(|| admin.error(ApiError::not_found(format!("Client '{}' not found", id))))?;

    Ok(WithQuota::new(Json(ClientResponse::from(&client)), admin.quota))
}

/// DELETE /admin/clients/{id}
pub async fn delete_client(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<WithQuota<StatusCode>, ApiError> {
    let id = parse_client_id(&admin, id)?;

    let deleted = state
        .credential_service
        .delete(&id)
        .await
        .map_err(|e| admin.error(e))?;

    if !deleted {
        return Err(admin.error(ApiError::not_found(format!("Client '{}' not found", id))));
    }

    info!(admin = %admin.principal.identifier(), client_id = %id, "Client deleted via admin API");

    Ok(WithQuota::new(StatusCode::NO_CONTENT, admin.quota))
}

async fn set_status(
    state: AppState,
    admin: RequireAdmin,
    id: String,
    status: ClientStatus,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    let id = parse_client_id(&admin, id)?;

    let client = state
        .credential_service
        .update_status(&id, status)
        .await
        .map_err(|e| admin.error(e))?;

    info!(
        admin = %admin.principal.identifier(),
        client_id = %id,
        status = status.as_str(),
        "Client status changed via admin API"
    );

    Ok(WithQuota::new(Json(ClientResponse::from(&client)), admin.quota))
}

/// POST /admin/clients/{id}/suspend
pub async fn suspend_client(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    set_status(state, admin, id, ClientStatus::Suspended).await
}

/// POST /admin/clients/{id}/activate
pub async fn activate_client(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    set_status(state, admin, id, ClientStatus::Active).await
}

/// PUT /admin/clients/{id}/tier
pub async fn update_tier(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
    Json(request): Json<UpdateTierRequest>,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    let id = parse_client_id(&admin, id)?;
    let tier = parse_tier(&admin, &request.tier)?;

    let client = state
        .credential_service
        .update_tier(&id, tier)
        .await
        .map_err(|e| admin.error(e))?;

    Ok(WithQuota::new(Json(ClientResponse::from(&client)), admin.quota))
}

/// PUT /admin/clients/{id}/quota
pub async fn update_quota(
    State(state): State<AppState>,
    admin: RequireAdmin,
    Path(id): Path<String>,
    Json(request): Json<UpdateQuotaRequest>,
) -> Result<WithQuota<Json<ClientResponse>>, ApiError> {
    let id = parse_client_id(&admin, id)?;
    request.validate().map_err(|_| {
        admin.error(
            ApiError::bad_request(format!("quota must not exceed {}", MAX_QUOTA_OVERRIDE))
                .with_param("quota"),
        )
    })?;

    let client = state
        .credential_service
        .update_quota(&id, request.quota)
        .await
        .map_err(|e| admin.error(e))?;

    Ok(WithQuota::new(Json(ClientResponse::from(&client)), admin.quota))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::create_router_with_state;
    use crate::api::state::test_support::TestApp;

    use super::*;

    const BOOTSTRAP_KEY: &str = "ak_live_bootstrap-secret";

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn app_with_bootstrap() -> (TestApp, Router) {
        let app = TestApp::new();
        app.credentials
            .create_client_with_secret(
                ClientId::new("bootstrap-admin").unwrap(),
                "Bootstrap admin",
                Tier::Enterprise,
                BOOTSTRAP_KEY,
            )
            .await
            .unwrap();
        let router = create_router_with_state(app.state.clone());
        (app, router)
    }

    fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", BOOTSTRAP_KEY);

        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
        router.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_key_creates_client() {
        let (_app, router) = app_with_bootstrap().await;

        let response = send(
            &router,
            admin_request(
                "POST",
                "/admin/clients",
                Some(json!({"display_name": "Acme", "tier": "standard"})),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["credential"].as_str().unwrap().starts_with("ak_live_"));
        assert_eq!(body["tier"], "standard");
        assert_eq!(body["quota_per_window"], 1000);
        assert_eq!(body["roles"], json!(["read"]));
    }

    #[tokio::test]
    async fn test_non_admin_token_is_forbidden() {
        let (app, router) = app_with_bootstrap().await;
        let token = app.access_token("Reader", Tier::Standard).await;

        let response = send(
            &router,
            Request::get("/admin/clients")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_enterprise_api_key_cannot_bypass_token_quota() {
        let (app, router) = app_with_bootstrap().await;
        let enterprise = app.client("Ops", Tier::Enterprise).await;

        for _ in 0..3 {
            let response = send(
                &router,
                Request::get("/admin/clients")
                    .header("x-api-key", &enterprise.credential)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().get("x-ratelimit-limit").is_none());
        }

        let response = send(&router, admin_request("GET", "/admin/clients", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_token_lists_with_quota_headers() {
        let (app, router) = app_with_bootstrap().await;
        let token = app.access_token("Ops", Tier::Enterprise).await;

        let response = send(
            &router,
            Request::get("/admin/clients?status=active")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10000");
        assert_eq!(body_json(response).await["total"], 2);
    }

    #[tokio::test]
    async fn test_missing_admin_credentials() {
        let (_app, router) = app_with_bootstrap().await;

        let response = send(
            &router,
            Request::get("/admin/clients").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_app, router) = app_with_bootstrap().await;

        let response = send(
            &router,
            admin_request("POST", "/admin/clients", Some(json!({"display_name": ""}))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &router,
            admin_request(
                "POST",
                "/admin/clients",
                Some(json!({"display_name": "Acme", "tier": "platinum"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["param"], "tier");
    }

    #[tokio::test]
    async fn test_suspend_blocks_exchange_and_activate_restores() {
        let (app, router) = app_with_bootstrap().await;
        let created = app.client("Acme", Tier::Free).await;
        let id = created.client.id().to_string();

        let response = send(
            &router,
            admin_request("POST", &format!("/admin/clients/{}/suspend", id), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "suspended");
        assert_eq!(body["quota_per_window"], 0);

        let exchange = |router: Router, credential: String| async move {
            router
                .oneshot(
                    Request::post("/auth/token")
                        .header("x-api-key", credential)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
                .status()
        };

        assert_eq!(
            exchange(router.clone(), created.credential.clone()).await,
            StatusCode::UNAUTHORIZED
        );

        send(
            &router,
            admin_request("POST", &format!("/admin/clients/{}/activate", id), None),
        )
        .await;

        assert_eq!(
            exchange(router.clone(), created.credential.clone()).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_update_tier_and_quota() {
        let (app, router) = app_with_bootstrap().await;
        let created = app.client("Acme", Tier::Free).await;
        let id = created.client.id().to_string();

        let response = send(
            &router,
            admin_request(
                "PUT",
                &format!("/admin/clients/{}/tier", id),
                Some(json!({"tier": "enterprise"})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["quota_per_window"], 10_000);

        let response = send(
            &router,
            admin_request(
                "PUT",
                &format!("/admin/clients/{}/quota", id),
                Some(json!({"quota": 5})),
            ),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["quota_per_window"], 5);
        assert_eq!(body["quota_override"], 5);

        let response = send(
            &router,
            admin_request(
                "PUT",
                &format!("/admin/clients/{}/quota", id),
                Some(json!({"quota": null})),
            ),
        )
        .await;
        assert_eq!(body_json(response).await["quota_per_window"], 10_000);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let (app, router) = app_with_bootstrap().await;
        let created = app.client("Acme", Tier::Free).await;
        let uri = format!("/admin/clients/{}", created.client.id());

        let response = send(&router, admin_request("GET", &uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await.get("credential").is_none());

        let response = send(&router, admin_request("DELETE", &uri, None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&router, admin_request("GET", &uri, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&router, admin_request("DELETE", &uri, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_client_id() {
        let (_app, router) = app_with_bootstrap().await;

        let response = send(&router, admin_request("GET", "/admin/clients/bad--id", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["param"], "id");
    }
}
