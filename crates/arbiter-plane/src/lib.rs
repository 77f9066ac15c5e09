//! Container Arbiter Server
//!
//! The arbiter is the authorization hub of a container platform. It:
//! - Keeps a registry of containers and their trust attributes
//! - Lets the container manager grant and revoke route permissions
//! - Hands each store its root secret, exactly once
//! - Mints macaroons that let one container call a route on another
//!
//! ## API Endpoints
//!
//! ### Open
//! - `GET /status` - Liveness check
//! - `GET /health` - Version and container count
//!
//! ### Any API key
//! - `GET /cat` - Root Hypercat catalogue of registered stores
//! - `POST /token` - Mint a token for the calling container
//! - `GET /store/secret` - Collect a store's root secret
//!
//! ### Container manager key
//! - `POST /cm/upsert-container-info` - Create or update a container
//! - `POST /cm/delete-container-info` - Remove a container
//! - `POST /cm/grant-container-permissions` - Grant a route
//! - `POST /cm/revoke-container-permissions` - Revoke a route or caveats

pub mod api;
pub mod config;
pub mod registry;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ArbiterConfig, ConfigError};
pub use registry::{CatalogueItem, ContainerUpdate, ContainerView, Registry};
