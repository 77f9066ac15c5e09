//! Core types for the arbiter

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// A callable endpoint on a target container
///
/// Identity is literal equality of all three fields. No normalization is
/// applied, so `/data` and `/data/` are different routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Name of the container being called
    pub target: String,
    /// Request path (or path template for pattern grants)
    pub path: String,
    /// HTTP method
    pub method: String,
}

impl Route {
    /// Create a new route
    pub fn new(
        target: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    /// Reject routes with an empty field
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(CoreError::MissingField("route.target".into()));
        }
        if self.path.is_empty() {
            return Err(CoreError::MissingField("route.path".into()));
        }
        if self.method.is_empty() {
            return Err(CoreError::MissingField("route.method".into()));
        }
        Ok(())
    }

    /// Bucket key for pattern lookups
    pub fn target_method(&self) -> TargetMethod {
        TargetMethod {
            target: self.target.clone(),
            method: self.method.clone(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.method, self.target, self.path)
    }
}

/// Index bucket for path patterns: `(target, method)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetMethod {
    pub target: String,
    pub method: String,
}

/// Kind of container as declared by the container manager
///
/// Open-ended: unrecognised types are kept verbatim. Only `store` carries
/// meaning to the arbiter (catalogue publication, secret issuance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContainerType {
    Store,
    App,
    Driver,
    Other(String),
}

impl ContainerType {
    pub fn as_str(&self) -> &str {
        match self {
            ContainerType::Store => "store",
            ContainerType::App => "app",
            ContainerType::Driver => "driver",
            ContainerType::Other(s) => s,
        }
    }

    pub fn is_store(&self) -> bool {
        matches!(self, ContainerType::Store)
    }
}

impl From<String> for ContainerType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "store" => ContainerType::Store,
            "app" => ContainerType::App,
            "driver" => ContainerType::Driver,
            _ => ContainerType::Other(s),
        }
    }
}

impl From<&str> for ContainerType {
    fn from(s: &str) -> Self {
        ContainerType::from(s.to_string())
    }
}

impl From<ContainerType> for String {
    fn from(t: ContainerType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_route_identity_is_structural() {
        let mut map = HashMap::new();
        map.insert(Route::new("store-x", "/data", "GET"), 1);

        // Built at a different call site, same values
        let again = Route::new(String::from("store-x"), "/data", String::from("GET"));
        assert_eq!(map.get(&again), Some(&1));

        assert!(map.get(&Route::new("store-x", "/data/", "GET")).is_none());
        assert!(map.get(&Route::new("store-x", "/data", "get")).is_none());
    }

    #[test]
    fn test_route_validation() {
        assert!(Route::new("t", "/p", "GET").validate().is_ok());

        let err = Route::new("t", "", "GET").validate().unwrap_err();
        assert!(matches!(err, CoreError::MissingField(f) if f == "route.path"));
    }

    #[test]
    fn test_container_type_round_trip() {
        let t: ContainerType = serde_json::from_str("\"store\"").unwrap();
        assert!(t.is_store());

        let t: ContainerType = serde_json::from_str("\"sensor\"").unwrap();
        assert_eq!(t, ContainerType::Other("sensor".into()));
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"sensor\"");
    }
}
