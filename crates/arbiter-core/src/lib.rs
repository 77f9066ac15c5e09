//! # Arbiter Core
//!
//! Authorization primitives for the container arbiter: the route-level
//! permission index, path pattern matching, and minting of macaroon
//! capability tokens that one container presents to another.
//!
//! ## Key Concepts
//!
//! - **Route**: the `(target, path, method)` triple naming a callable endpoint
//! - **Caveat**: an opaque restriction appended to a token
//! - **Pattern grant**: a permission expressed as a path template, authorizing
//!   any matching path but never attaching extra caveats
//! - **Root secret**: the per-store key tokens are chained from, issued once
//!
//! ## Token Layout
//!
//! Every minted token carries, in order:
//!
//! 1. `target = <target>`
//! 2. `path = <path>`
//! 3. `method = <method>`
//! 4. the caveats granted against the exact route, in grant order

pub mod error;
pub mod macaroon;
pub mod pattern;
pub mod permissions;
pub mod secret;
pub mod token;
pub mod types;

pub use error::{CoreError, ErrorKind, Result};
pub use macaroon::{Macaroon, MacaroonBuilder};
pub use pattern::PathPattern;
pub use permissions::{Decision, PermissionIndex, RevocationMode};
pub use secret::RootSecret;
pub use token::TokenMinter;
pub use types::{ContainerType, Route, TargetMethod};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
