//! Arbiter configuration
//!
//! Read once from the environment at startup. Invalid values are fatal.

use arbiter_core::RevocationMode;
use std::env;
use std::fmt;
use thiserror::Error;
use tracing::Level;

use crate::registry::DEFAULT_STORE_PORT;

pub const DEFAULT_PORT: u16 = 8080;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: String,
    },
}

/// Service configuration
#[derive(Clone)]
pub struct ArbiterConfig {
    /// Listen port
    pub port: u16,
    /// Container manager key; empty disables the `/cm` routes
    pub cm_key: String,
    /// Canonical address minted tokens are bound to
    pub public_url: String,
    /// Port advertised in default store catalogue items
    pub store_port: u16,
    /// Pattern pruning on revoke
    pub revocation_mode: RevocationMode,
    pub log_level: Level,
}

impl fmt::Debug for ArbiterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbiterConfig")
            .field("port", &self.port)
            .field("cm_key", &if self.cm_key.is_empty() { "" } else { "[redacted]" })
            .field("public_url", &self.public_url)
            .field("store_port", &self.store_port)
            .field("revocation_mode", &self.revocation_mode)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cm_key: String::new(),
            public_url: default_public_url(DEFAULT_PORT),
            store_port: DEFAULT_STORE_PORT,
            revocation_mode: RevocationMode::default(),
            log_level: Level::INFO,
        }
    }
}

fn default_public_url(port: u16) -> String {
    format!("https://databox-arbiter:{}", port)
}

fn parse_port(var: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value,
        expected: "a valid port number".into(),
    })
}

impl ArbiterConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load using `lookup` to read variables
    ///
    /// `PORT` and `CM_KEY` are accepted when the `ARBITER_` names are unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("ARBITER_PORT").or_else(|| lookup("PORT")) {
            Some(value) => parse_port("ARBITER_PORT", value)?,
            None => DEFAULT_PORT,
        };

        let cm_key = lookup("ARBITER_CM_KEY")
            .or_else(|| lookup("CM_KEY"))
            .unwrap_or_default();

        let public_url = lookup("ARBITER_PUBLIC_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| default_public_url(port));

        let store_port = match lookup("ARBITER_STORE_PORT") {
            Some(value) => parse_port("ARBITER_STORE_PORT", value)?,
            None => DEFAULT_STORE_PORT,
        };

        let revocation_mode = match lookup("ARBITER_PATTERN_REVOCATION") {
            Some(value) => value.parse().map_err(|reason| ConfigError::InvalidValue {
                var: "ARBITER_PATTERN_REVOCATION",
                value,
                expected: reason,
            })?,
            None => RevocationMode::default(),
        };

        let log_level = match lookup("ARBITER_LOG_LEVEL") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "ARBITER_LOG_LEVEL",
                value,
                expected: "one of trace, debug, info, warn, error".into(),
            })?,
            None => Level::INFO,
        };

        Ok(Self {
            port,
            cm_key,
            public_url,
            store_port,
            revocation_mode,
            log_level,
        })
    }
}
