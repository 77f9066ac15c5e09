//! API request handlers

pub mod catalogue;
pub mod manager;
pub mod token;

pub use catalogue::{get_catalogue, Catalogue};
pub use manager::{
    delete_container, grant_permissions, revoke_permissions, upsert_container,
    ContainerNameRequest, PermissionRequest, RouteRequest, UpsertContainerRequest,
};
pub use token::{issue_secret, mint_token, TokenRequest};

use arbiter_core::TokenMinter;
use axum::{extract::rejection::JsonRejection, Json};

use crate::api::error::ApiError;
use crate::config::ArbiterConfig;
use crate::registry::Registry;

/// Application state shared across handlers
pub struct AppState {
    /// Containers, grants and secrets
    pub registry: Registry,
    /// Mints tokens bound to this arbiter's public address
    pub minter: TokenMinter,
    pub config: ArbiterConfig,
}

impl AppState {
    /// Build state from configuration
    pub fn new(config: ArbiterConfig) -> Self {
        let registry = Registry::new()
            .with_store_port(config.store_port)
            .with_revocation_mode(config.revocation_mode);
        let minter = TokenMinter::new(config.public_url.clone());

        Self {
            registry,
            minter,
            config,
        }
    }
}

/// Unwrap a JSON body, reporting decode failures as bad requests
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
