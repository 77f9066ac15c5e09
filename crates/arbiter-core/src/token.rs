//! Token minting
//!
//! The minter turns an authorization decision into a serialized macaroon
//! keyed by the target store's root secret.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::error::Result;
use crate::macaroon::MacaroonBuilder;
use crate::secret::{random_bytes, RootSecret};
use crate::types::Route;

/// Length of the random token identifier in bytes
pub const NONCE_LENGTH: usize = 32;

/// Mints capability tokens on behalf of the arbiter
#[derive(Debug, Clone)]
pub struct TokenMinter {
    location: String,
}

impl TokenMinter {
    /// `location` is the arbiter's own canonical address
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Mint a token for `route` keyed by the target's secret
    ///
    /// The token carries `target`, `path` and `method` caveats, in that order,
    /// followed by `extra_caveats` as stored.
    pub fn mint(
        &self,
        target_secret: &RootSecret,
        route: &Route,
        extra_caveats: &[String],
    ) -> Result<String> {
        self.mint_with(&mut OsRng, target_secret, route, extra_caveats)
    }

    /// Like [`TokenMinter::mint`], drawing the identifier from `rng`
    pub fn mint_with<R: RngCore + ?Sized>(
        &self,
        rng: &mut R,
        target_secret: &RootSecret,
        route: &Route,
        extra_caveats: &[String],
    ) -> Result<String> {
        let nonce = random_bytes(rng, NONCE_LENGTH)?;

        let mut builder = MacaroonBuilder::new(&self.location, target_secret, STANDARD.encode(nonce))
            .add_first_party_caveat(format!("target = {}", route.target))
            .add_first_party_caveat(format!("path = {}", route.path))
            .add_first_party_caveat(format!("method = {}", route.method));

        for caveat in extra_caveats {
            builder = builder.add_first_party_caveat(caveat.as_str());
        }

        let token = builder.build().serialize()?;

        debug!(
            route = %route,
            extra_caveats = extra_caveats.len(),
            "Minted token"
        );

        Ok(token)
    }
}
