//! Analytics endpoints behind the gateway

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, WithQuota};
use crate::domain::analytics::{AnalyticsQuery, EntityRef};
use crate::domain::client::Role;
use crate::domain::gateway::RoutePolicy;

const READ: RoutePolicy = RoutePolicy::requires(Role::Read);
const WRITE: RoutePolicy = RoutePolicy::requires(Role::Write);

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct RowAppended {
    pub entity: String,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EntityInvalidated {
    pub entity: String,
    pub removed: usize,
}

/// Entity from path segments
///
/// Kinds sharing the quota counter namespace would let invalidation wipe counters.
fn entity_from_path(state: &AppState, kind: String, id: String) -> Result<EntityRef, ApiError> {
    if kind == state.gateway.quota().config().key_prefix {
        return Err(ApiError::bad_request(format!("Entity kind '{}' is reserved", kind))
            .with_param("kind"));
    }

    Ok(EntityRef::new(kind, id)?)
}

/// GET /v1/{kind}/{id}?page=N
pub async fn get_entity_page(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<WithQuota<Json<Value>>, ApiError> {
    let entity = entity_from_path(&state, kind, id)?;
    let query = AnalyticsQuery {
        entity,
        page: params.page,
    };

    debug!(entity = %query.entity, page = query.page, "Analytics read");

    let response = state
        .gateway
        .handle(&headers, READ, &query, state.resolver.as_ref())
        .await?;

    Ok(WithQuota::new(Json(response.value), response.quota))
}

/// POST /v1/{kind}/{id}/rows
pub async fn append_row(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(row): Json<Value>,
) -> Result<WithQuota<(StatusCode, Json<RowAppended>)>, ApiError> {
    let entity = entity_from_path(&state, kind, id)?;
    let admission = state.gateway.admit(&headers, WRITE).await?;

    let row_count = state
        .writer
        .append(entity.clone(), row)
        .await
        .map_err(|e| ApiError::from(e).with_quota(admission.quota.clone()))?;

    info!(entity = %entity, row_count, event = "row_appended", "Appended dataset row");

    Ok(WithQuota::new(
        (
            StatusCode::CREATED,
            Json(RowAppended {
                entity: entity.to_string(),
                row_count,
            }),
        ),
        admission.quota,
    ))
}

/// POST /v1/{kind}/{id}/invalidate
pub async fn invalidate_entity(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<WithQuota<Json<EntityInvalidated>>, ApiError> {
    let entity = entity_from_path(&state, kind, id)?;
    let admission = state.gateway.admit(&headers, WRITE).await?;

    let removed = state
        .gateway
        .cache()
        .invalidate_entity(&entity)
        .await
        .map_err(|e| ApiError::from(e).with_quota(admission.quota.clone()))?;

    Ok(WithQuota::new(
        Json(EntityInvalidated {
            entity: entity.to_string(),
            removed,
        }),
        admission.quota,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::create_router_with_state;
    use crate::api::state::test_support::TestApp;
    use crate::domain::cache::MockCacheStore;
    use crate::domain::client::Tier;
    use crate::infrastructure::auth::TokenService;

    use super::*;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get(router: &Router, uri: &str, token: Option<&str>) -> axum::response::Response {
        let mut request = Request::get(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(router: &Router, uri: &str, token: &str, body: Value) -> axum::response::Response {
        router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("authorization", format!("Bearer {}", token))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_reports_quota_headers() {
        let app = TestApp::new();
        let token = app.access_token("Acme", Tier::Free).await;
        let router = create_router_with_state(app.state.clone());

        let response = get(&router, "/v1/pool/X?page=0", Some(&token)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "99");
        assert!(response.headers().contains_key("x-ratelimit-reset"));

        let body = body_json(response).await;
        assert_eq!(body["kind"], "pool");
        assert_eq!(body["rows"], json!([]));
    }

    #[tokio::test]
    async fn test_missing_token_has_no_quota_headers() {
        let app = TestApp::new();
        let router = create_router_with_state(app.state.clone());

        let response = get(&router, "/v1/pool/X", None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
        assert_eq!(body_json(response).await["error"]["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_rate_limited_read() {
        let app = TestApp::new();
        let created = app.client("Tiny", Tier::Free).await;
        let client = app
            .credentials
            .update_quota(created.client.id(), Some(1))
            .await
            .unwrap();
        let token = app.tokens.issue_token_pair(&client).unwrap().access_token;
        let router = create_router_with_state(app.state.clone());

        assert_eq!(get(&router, "/v1/pool/X", Some(&token)).await.status(), StatusCode::OK);

        let response = get(&router, "/v1/pool/X", Some(&token)).await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert!(response.headers().contains_key("retry-after"));
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "rate_limit_exceeded");
        assert!(body["error"]["retry_after"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_read_role_cannot_write() {
        let app = TestApp::new();
        let token = app.access_token("Reader", Tier::Standard).await;
        let router = create_router_with_state(app.state.clone());

        let response = post(&router, "/v1/pool/X/rows", &token, json!({"volume": 1})).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "insufficient_permissions");
    }

    #[tokio::test]
    async fn test_write_then_invalidate_refreshes_reads() {
        let app = TestApp::new();
        let token = app.access_token("Indexer", Tier::Enterprise).await;
        let router = create_router_with_state(app.state.clone());

        let before = body_json(get(&router, "/v1/pool/X", Some(&token)).await).await;
        assert_eq!(before["total_rows"], 0);

        let response = post(&router, "/v1/pool/X/rows", &token, json!({"volume": 42})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["row_count"], 1);

        let response = post(&router, "/v1/pool/X/invalidate", &token, json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-limit"));

        let after = body_json(get(&router, "/v1/pool/X", Some(&token)).await).await;
        assert_eq!(after["total_rows"], 1);
        assert_eq!(after["rows"], json!([{"volume": 42}]));
    }

    #[tokio::test]
    async fn test_non_object_row_is_rejected_with_quota() {
        let app = TestApp::new();
        let token = app.access_token("Indexer", Tier::Enterprise).await;
        let router = create_router_with_state(app.state.clone());

        let response = post(&router, "/v1/pool/X/rows", &token, json!([1, 2])).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
    }

    #[tokio::test]
    async fn test_reserved_kind_is_rejected() {
        let app = TestApp::new();
        let token = app.access_token("Acme", Tier::Free).await;
        let router = create_router_with_state(app.state.clone());

        let response = get(&router, "/v1/quota/acme", Some(&token)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_outage_degrades() {
        let app = TestApp::with_store(Arc::new(MockCacheStore::new().with_error("down")));
        let token = app.access_token("Acme", Tier::Free).await;
        let router = create_router_with_state(app.state.clone());

        let response = get(&router, "/v1/pool/X", Some(&token)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-degraded"], "true");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "100");
    }
}
