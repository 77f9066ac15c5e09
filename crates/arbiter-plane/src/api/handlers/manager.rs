//! Container Manager Handlers
//!
//! Registration and permission management, restricted to the container
//! manager key:
//! - `POST /cm/upsert-container-info`
//! - `POST /cm/delete-container-info`
//! - `POST /cm/grant-container-permissions`
//! - `POST /cm/revoke-container-permissions`

use arbiter_core::{ContainerType, CoreError, Route};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::handlers::{json_body, AppState};
use crate::registry::{CatalogueItem, ContainerUpdate, ContainerView};

/// Request to create or update a container
///
/// Only the listed fields are accepted. Anything else, `secret` in
/// particular, is rejected before the registry is touched.
#[derive(Debug, Deserialize)]
pub struct UpsertContainerRequest {
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub container_type: Option<ContainerType>,

    /// API key the container will authenticate with
    pub key: Option<String>,

    #[serde(rename = "catItem")]
    pub cat_item: Option<CatalogueItem>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Request naming a single container
#[derive(Debug, Deserialize)]
pub struct ContainerNameRequest {
    pub name: Option<String>,
}

/// Route as sent by the container manager
#[derive(Debug, Default, Deserialize)]
pub struct RouteRequest {
    pub target: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
}

/// Request to grant or revoke route permissions
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub name: Option<String>,
    pub route: Option<RouteRequest>,
    pub caveats: Option<Vec<String>>,
}

fn required(value: Option<String>, field: &str) -> Result<String, CoreError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::MissingField(field.to_string()))
}

impl RouteRequest {
    fn into_route(self) -> Result<Route, CoreError> {
        Ok(Route::new(
            required(self.target, "route.target")?,
            required(self.path, "route.path")?,
            required(self.method, "route.method")?,
        ))
    }
}

impl PermissionRequest {
    fn into_parts(self) -> Result<(String, Route, Vec<String>), CoreError> {
        let name = required(self.name, "name")?;
        let route = self
            .route
            .ok_or_else(|| CoreError::MissingField("route".into()))?
            .into_route()?;
        Ok((name, route, self.caveats.unwrap_or_default()))
    }
}

/// Create or update a container record
///
/// POST /cm/upsert-container-info
pub async fn upsert_container(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpsertContainerRequest>, JsonRejection>,
) -> Result<Json<ContainerView>, ApiError> {
    let request = json_body(payload)?;

    let name = required(request.name, "name")?;
    if let Some(field) = request.other.keys().next() {
        return Err(CoreError::ForbiddenField(field.clone()).into());
    }

    let update = ContainerUpdate {
        container_type: request.container_type,
        catalogue_item: request.cat_item,
        api_key: request.key,
    };
    let view = state.registry.upsert(&name, update)?;

    Ok(Json(view))
}

/// Remove a container record
///
/// POST /cm/delete-container-info
pub async fn delete_container(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContainerNameRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request = json_body(payload)?;
    let name = required(request.name, "name")?;

    state.registry.delete(&name);
    Ok(StatusCode::OK)
}

/// Grant a route, returning its caveats
///
/// POST /cm/grant-container-permissions
pub async fn grant_permissions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PermissionRequest>, JsonRejection>,
) -> Result<Json<Vec<String>>, ApiError> {
    let (name, route, caveats) = json_body(payload)?.into_parts()?;

    let stored = state.registry.grant(&name, &route, &caveats)?;
    Ok(Json(stored))
}

/// Revoke a route or some of its caveats
///
/// POST /cm/revoke-container-permissions
///
/// Responds with the surviving caveats, or `null` when the route was revoked
/// entirely.
pub async fn revoke_permissions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PermissionRequest>, JsonRejection>,
) -> Result<Json<Option<Vec<String>>>, ApiError> {
    let (name, route, caveats) = json_body(payload)?.into_parts()?;

    let remaining = state.registry.revoke(&name, &route, &caveats)?;
    Ok(Json(remaining))
}
