//! API module for the arbiter server

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub containers: usize,
}

/// Liveness probe
///
/// GET /status
pub async fn status() -> &'static str {
    "active"
}

/// Health check endpoint
///
/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        containers: state.registry.len(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let manager = Router::new()
        .route("/cm/upsert-container-info", post(handlers::upsert_container))
        .route("/cm/delete-container-info", post(handlers::delete_container))
        .route("/cm/grant-container-permissions", post(handlers::grant_permissions))
        .route("/cm/revoke-container-permissions", post(handlers::revoke_permissions))
        .route_layer(from_fn_with_state(state.clone(), auth::require_container_manager));

    let authenticated = Router::new()
        .route("/cat", get(handlers::get_catalogue))
        .route("/token", post(handlers::mint_token))
        .route("/store/secret", get(handlers::issue_secret))
        .merge(manager)
        .route_layer(from_fn_with_state(state.clone(), auth::authenticate));

    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
