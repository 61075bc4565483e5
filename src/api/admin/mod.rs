//! Admin API endpoints for managing gateway clients

pub mod clients;

use axum::{
    routing::{get, post, put},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/{client_id}",
            get(clients::get_client).delete(clients::delete_client),
        )
        .route("/clients/{client_id}/suspend", post(clients::suspend_client))
        .route("/clients/{client_id}/activate", post(clients::activate_client))
        .route("/clients/{client_id}/tier", put(clients::update_tier))
        .route("/clients/{client_id}/quota", put(clients::update_quota))
}
