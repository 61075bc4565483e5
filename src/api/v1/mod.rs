//! Versioned analytics API

pub mod analytics;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/{kind}/{id}", get(analytics::get_entity_page))
        .route("/{kind}/{id}/rows", post(analytics::append_row))
        .route("/{kind}/{id}/invalidate", post(analytics::invalidate_entity))
}
