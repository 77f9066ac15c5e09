//! Store root secrets
//!
//! A root secret keys every token minted for a store. It is generated once,
//! handed to the store once, and otherwise never leaves the arbiter.

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;

/// Secret length in bytes, as suggested by libmacaroons
pub const SECRET_LENGTH: usize = 32;

/// Symmetric key shared between the arbiter and one store
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RootSecret(Vec<u8>);

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootSecret([redacted])")
    }
}

impl RootSecret {
    /// Generate a fresh secret from the OS random source
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a fresh secret from `rng`
    ///
    /// A failing source is reported, never retried.
    pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        Ok(Self(random_bytes(rng, SECRET_LENGTH)?))
    }

    /// Wrap existing key material
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64, the form handed to the store
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

pub(crate) fn random_bytes<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}
