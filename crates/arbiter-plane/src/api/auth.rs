//! Caller identification
//!
//! Callers present an API key in `X-Api-Key` or as the user name of HTTP
//! Basic credentials. The key is resolved against the registry before any
//! handler runs; `/cm` routes additionally require the container manager key.

use arbiter_core::CoreError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Who is calling, as established by [`authenticate`]
#[derive(Debug, Clone)]
pub struct Caller {
    pub key: String,
    /// Registered container holding the key, if any
    pub container: Option<String>,
}

impl Caller {
    /// The caller's container, or an authentication error
    pub fn container(&self) -> Result<&str, CoreError> {
        self.container.as_deref().ok_or(CoreError::UnknownApiKey)
    }
}

/// Extract the presented API key, if any
pub fn api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    let header_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty());
    if let Some(key) = header_key {
        return Some(key.to_string());
    }

    let authorization = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let user = decoded.split_once(':').map_or(decoded.as_str(), |(user, _)| user);

    (!user.is_empty()).then(|| user.to_string())
}

/// Require an API key and attach the resolved [`Caller`]
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = api_key_from_headers(request.headers()).ok_or(CoreError::MissingApiKey)?;
    let container = state.registry.lookup_by_api_key(&key);

    debug!(container = ?container, path = %request.uri().path(), "Authenticated request");

    request.extensions_mut().insert(Caller { key, container });
    Ok(next.run(request).await)
}

/// Require the container manager key
pub async fn require_container_manager(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .extensions()
        .get::<Caller>()
        .map(|caller| caller.key.as_str())
        .unwrap_or_default();

    let expected = state.config.cm_key.as_str();
    let matches: bool = presented.as_bytes().ct_eq(expected.as_bytes()).into();
    if expected.is_empty() || !matches {
        warn!(path = %request.uri().path(), "Rejected container manager request");
        return Err(ApiError::Unauthorized("Arbiter key invalid".into()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("key-a"));
        assert_eq!(api_key_from_headers(&headers).as_deref(), Some("key-a"));
    }

    #[test]
    fn test_basic_auth_user_name() {
        let mut headers = HeaderMap::new();
        let credentials = STANDARD.encode("key-b:");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", credentials)).unwrap(),
        );
        assert_eq!(api_key_from_headers(&headers).as_deref(), Some("key-b"));
    }

    #[test]
    fn test_header_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("key-a"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", STANDARD.encode("key-b:x"))).unwrap(),
        );
        assert_eq!(api_key_from_headers(&headers).as_deref(), Some("key-a"));
    }

    #[test]
    fn test_missing_or_unusable_credentials() {
        assert!(api_key_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(api_key_from_headers(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(":password"))).unwrap(),
        );
        assert!(api_key_from_headers(&headers).is_none());
    }
}
