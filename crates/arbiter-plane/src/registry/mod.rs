//! Container Registry
//!
//! Thread-safe, process-lifetime store of containers and their grants.
//! All state is lost on restart; the container manager re-registers.
//!
//! Every mutation runs under the write lock, so concurrent grants on one
//! route cannot lose updates and secret issuance is a single check-and-set.

mod container;

pub use container::{
    CatalogueItem, Container, ContainerUpdate, ContainerView, Metadata,
    HYPERCAT_CATALOGUE_TYPE, HYPERCAT_CONTENT_TYPE_REL, HYPERCAT_DESCRIPTION_REL,
};

use arbiter_core::{
    CoreError, Decision, Result, RevocationMode, RootSecret, Route, TokenMinter,
};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{info, warn};

/// Port advertised in default store catalogue items
pub const DEFAULT_STORE_PORT: u16 = 8080;

/// In-memory container registry
#[derive(Debug)]
pub struct Registry {
    containers: RwLock<IndexMap<String, Container>>,
    store_port: u16,
    revocation_mode: RevocationMode,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(IndexMap::new()),
            store_port: DEFAULT_STORE_PORT,
            revocation_mode: RevocationMode::default(),
        }
    }

    pub fn with_store_port(mut self, port: u16) -> Self {
        self.store_port = port;
        self
    }

    pub fn with_revocation_mode(mut self, mode: RevocationMode) -> Self {
        self.revocation_mode = mode;
        self
    }

    // =========================================================================
    // Container records
    // =========================================================================

    /// Create or update a container
    ///
    /// A container that becomes a store gets a default catalogue item, which
    /// an explicit `catalogue_item` in the same update overrides. One that
    /// stops being a store loses its item. All fields, the API key included,
    /// are applied under a single write guard.
    pub fn upsert(&self, name: &str, update: ContainerUpdate) -> Result<ContainerView> {
        if name.is_empty() {
            return Err(CoreError::MissingField("name".into()));
        }
        if update.api_key.as_deref() == Some("") {
            return Err(CoreError::MissingField("key".into()));
        }

        let mut containers = self.containers.write();

        if let Some(api_key) = update.api_key.as_deref() {
            let shared = containers
                .values()
                .any(|c| c.name != name && c.api_key.as_deref() == Some(api_key));
            if shared {
                warn!(container = %name, "API key is already held by another container");
            }
        }

        let container = containers
            .entry(name.to_string())
            .or_insert_with(|| Container::new(name));

        if let Some(container_type) = update.container_type {
            match (container.is_store(), container_type.is_store()) {
                (false, true) => {
                    container.catalogue_item =
                        Some(CatalogueItem::for_store(name, self.store_port));
                }
                (true, false) => container.catalogue_item = None,
                _ => {}
            }
            container.container_type = Some(container_type);
        }
        if let Some(item) = update.catalogue_item {
            container.catalogue_item = Some(item);
        }
        if let Some(api_key) = update.api_key {
            container.api_key = Some(api_key);
        }

        info!(
            container = %name,
            container_type = ?container.container_type,
            has_key = container.api_key.is_some(),
            "Upserted container"
        );

        Ok(container.view())
    }

    /// Remove a container; removing an absent one is not an error
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.containers.write().shift_remove(name).is_some();
        if removed {
            info!(container = %name, "Deleted container");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<ContainerView> {
        self.containers.read().get(name).map(Container::view)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.containers.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }

    /// Catalogue items of all containers that have one, in registration order
    pub fn catalogue_items(&self) -> Vec<CatalogueItem> {
        self.containers
            .read()
            .values()
            .filter_map(|c| c.catalogue_item.clone())
            .collect()
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolve an API key to the name of the first container holding it
    pub fn lookup_by_api_key(&self, api_key: &str) -> Option<String> {
        self.containers
            .read()
            .values()
            .find(|c| c.api_key.as_deref() == Some(api_key))
            .map(|c| c.name.clone())
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Grant `grantee` access to `route`; returns the route's caveats
    pub fn grant(&self, grantee: &str, route: &Route, caveats: &[String]) -> Result<Vec<String>> {
        if grantee.is_empty() {
            return Err(CoreError::MissingField("name".into()));
        }

        let mut containers = self.containers.write();
        let stored = match containers.get_mut(grantee) {
            Some(container) => container.permissions.grant(route, caveats)?,
            None => {
                let mut container = Container::new(grantee);
                let stored = container.permissions.grant(route, caveats)?;
                containers.insert(grantee.to_string(), container);
                stored
            }
        };

        info!(
            container = %grantee,
            target = %route.target,
            path = %route.path,
            method = %route.method,
            caveats = stored.len(),
            "Granted route permission"
        );

        Ok(stored)
    }

    /// Revoke `grantee`'s access to `route`, wholly or caveat by caveat
    pub fn revoke(
        &self,
        grantee: &str,
        route: &Route,
        to_remove: &[String],
    ) -> Result<Option<Vec<String>>> {
        if grantee.is_empty() {
            return Err(CoreError::MissingField("name".into()));
        }

        let mode = self.revocation_mode;
        let mut containers = self.containers.write();
        let remaining = match containers.get_mut(grantee) {
            Some(container) => container.permissions.revoke(route, to_remove, mode)?,
            None => {
                let mut container = Container::new(grantee);
                let remaining = container.permissions.revoke(route, to_remove, mode)?;
                containers.insert(grantee.to_string(), container);
                remaining
            }
        };

        info!(
            container = %grantee,
            target = %route.target,
            path = %route.path,
            method = %route.method,
            full = remaining.is_none(),
            "Revoked route permission"
        );

        Ok(remaining)
    }

    /// Authorization decision for `grantee` calling `route`
    pub fn authorize(&self, grantee: &str, route: &Route) -> Decision {
        self.containers
            .read()
            .get(grantee)
            .map_or(Decision::Denied, |c| c.permissions.authorize(route))
    }

    // =========================================================================
    // Tokens and secrets
    // =========================================================================

    /// Mint a token for `caller` to call `route`
    ///
    /// Fails if the target is unknown or has not collected its secret, or if
    /// the caller holds no grant covering the route.
    pub fn mint_token(&self, minter: &TokenMinter, caller: &str, route: &Route) -> Result<String> {
        route.validate()?;

        let (secret, extra_caveats) = {
            let containers = self.containers.read();

            let target = containers
                .get(&route.target)
                .ok_or_else(|| CoreError::UnknownTarget(route.target.clone()))?;
            let secret = target
                .root_secret
                .clone()
                .ok_or_else(|| CoreError::TargetNotRegistered(route.target.clone()))?;

            let grantee = containers.get(caller).ok_or(CoreError::UnknownApiKey)?;
            match grantee.permissions.authorize(route) {
                Decision::Denied => {
                    warn!(
                        container = %caller,
                        target = %route.target,
                        path = %route.path,
                        method = %route.method,
                        "Token denied: insufficient route permissions"
                    );
                    return Err(CoreError::InsufficientPermissions);
                }
                decision => (secret, decision.into_extra_caveats()),
            }
        };

        let token = minter.mint(&secret, route, &extra_caveats)?;

        info!(
            container = %caller,
            target = %route.target,
            path = %route.path,
            method = %route.method,
            extra_caveats = extra_caveats.len(),
            "Issued token"
        );

        Ok(token)
    }

    /// Generate and attach a store's root secret, exactly once
    ///
    /// Returns the secret in base64; this is the only time it leaves the
    /// arbiter.
    pub fn issue_secret(&self, name: &str) -> Result<String> {
        let mut containers = self.containers.write();
        let container = containers.get_mut(name).ok_or(CoreError::UnknownApiKey)?;

        let container_type = container
            .container_type
            .as_ref()
            .ok_or(CoreError::ContainerTypeUnknown)?;
        if !container_type.is_store() {
            return Err(CoreError::NotAStore(container_type.to_string()));
        }
        if container.root_secret.is_some() {
            warn!(container = %name, "Rejected second secret request");
            return Err(CoreError::SecretAlreadyIssued);
        }

        let secret = RootSecret::generate()?;
        let encoded = secret.to_base64();
        container.root_secret = Some(secret);
        container.secret_issued_at = Some(Utc::now());

        info!(container = %name, "Issued store root secret");
        Ok(encoded)
    }

    /// Stored root secret, for in-process verification of minted tokens
    pub fn root_secret(&self, name: &str) -> Option<RootSecret> {
        self.containers
            .read()
            .get(name)
            .and_then(|c| c.root_secret.clone())
    }
}
