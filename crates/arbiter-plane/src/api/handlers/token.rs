//! Token and Secret Handlers
//!
//! - `POST /token` mints a macaroon for the calling container
//! - `GET /store/secret` hands a store its root secret, once

use arbiter_core::{CoreError, Route};
use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::auth::Caller;
use crate::api::error::ApiError;
use crate::api::handlers::{json_body, AppState};

/// Request for a token to call `target`
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub target: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
}

impl TokenRequest {
    fn into_route(self) -> Result<Route, CoreError> {
        let field = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CoreError::MissingField(name.to_string()))
        };
        Ok(Route::new(
            field(self.target, "target")?,
            field(self.path, "path")?,
            field(self.method, "method")?,
        ))
    }
}

/// Mint a token for the caller
///
/// POST /token
///
/// Responds with the serialized macaroon as plain text.
pub async fn mint_token(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let container = caller.container()?;
    let route = json_body(payload)?.into_route()?;

    let token = state
        .registry
        .mint_token(&state.minter, container, &route)?;
    Ok(token)
}

/// Issue the caller's root secret
///
/// GET /store/secret
///
/// Responds with the base64 secret as plain text. Only store containers may
/// call this, and only once.
pub async fn issue_secret(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<String, ApiError> {
    let container = caller.container()?;

    let secret = state.registry.issue_secret(container)?;
    Ok(secret)
}
