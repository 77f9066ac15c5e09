//! Container records

use arbiter_core::{ContainerType, PermissionIndex, RootSecret};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HYPERCAT_CONTENT_TYPE_REL: &str = "urn:X-hypercat:rels:isContentType";
pub const HYPERCAT_DESCRIPTION_REL: &str = "urn:X-hypercat:rels:hasDescription:en";
pub const HYPERCAT_CATALOGUE_TYPE: &str = "application/vnd.hypercat.catalogue+json";

/// A `rel`/`val` pair in Hypercat metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub rel: String,
    pub val: String,
}

impl Metadata {
    pub fn new(rel: impl Into<String>, val: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            val: val.into(),
        }
    }
}

/// Hypercat catalogue item advertising a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueItem {
    #[serde(rename = "item-metadata", default)]
    pub item_metadata: Vec<Metadata>,
    pub href: String,
}

impl CatalogueItem {
    /// Default item for a store reachable at `https://<name>:<port>`
    pub fn for_store(name: &str, port: u16) -> Self {
        Self {
            item_metadata: vec![
                Metadata::new(HYPERCAT_CONTENT_TYPE_REL, HYPERCAT_CATALOGUE_TYPE),
                Metadata::new(HYPERCAT_DESCRIPTION_REL, name),
            ],
            href: format!("https://{}:{}", name, port),
        }
    }
}

/// Fields the container manager may change through upsert
#[derive(Debug, Clone, Default)]
pub struct ContainerUpdate {
    pub container_type: Option<ContainerType>,
    pub catalogue_item: Option<CatalogueItem>,
    /// API key the container authenticates with
    pub api_key: Option<String>,
}

/// Registry entry for one container
#[derive(Debug)]
pub struct Container {
    pub(crate) name: String,
    pub(crate) container_type: Option<ContainerType>,
    pub(crate) api_key: Option<String>,
    pub(crate) root_secret: Option<RootSecret>,
    pub(crate) catalogue_item: Option<CatalogueItem>,
    pub(crate) permissions: PermissionIndex,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) secret_issued_at: Option<DateTime<Utc>>,
}

impl Container {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container_type: None,
            api_key: None,
            root_secret: None,
            catalogue_item: None,
            permissions: PermissionIndex::new(),
            created_at: Utc::now(),
            secret_issued_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_store(&self) -> bool {
        self.container_type
            .as_ref()
            .is_some_and(ContainerType::is_store)
    }

    pub(crate) fn view(&self) -> ContainerView {
        ContainerView {
            name: self.name.clone(),
            container_type: self.container_type.clone(),
            cat_item: self.catalogue_item.clone(),
            has_key: self.api_key.is_some(),
            has_secret: self.root_secret.is_some(),
            routes: self.permissions.routes().count(),
            created_at: self.created_at,
            secret_issued_at: self.secret_issued_at,
        }
    }
}

/// Externally visible form of a container
///
/// Never carries the API key or root secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub container_type: Option<ContainerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat_item: Option<CatalogueItem>,
    pub has_key: bool,
    pub has_secret: bool,
    pub routes: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_issued_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_catalogue_item() {
        let item = CatalogueItem::for_store("store-x", 8080);
        assert_eq!(item.href, "https://store-x:8080");
        assert_eq!(
            item.item_metadata[1],
            Metadata::new(HYPERCAT_DESCRIPTION_REL, "store-x")
        );

        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("item-metadata").is_some());
    }

    #[test]
    fn test_view_hides_credentials() {
        let mut container = Container::new("store-x");
        container.api_key = Some("very-secret-key".into());
        container.root_secret = Some(RootSecret::from_bytes(b"root".to_vec()));

        let json = serde_json::to_string(&container.view()).unwrap();
        assert!(!json.contains("very-secret-key"));
        assert!(json.contains("\"hasKey\":true"));
        assert!(json.contains("\"hasSecret\":true"));
    }
}
