//! Route permission index
//!
//! Each container owns one [`PermissionIndex`] describing what it may call:
//!
//! - an **exact** map from [`Route`] to the caveats attached to that route
//! - a **pattern** map from [`TargetMethod`] to the path templates granted
//!   for that target and method
//!
//! Exact grants take precedence. Pattern grants only ever convey the right to
//! request a token; they never attach extra caveats.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::pattern::PathPattern;
use crate::types::{Route, TargetMethod};

/// How revocation removes previously granted path patterns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationMode {
    /// Remove patterns whose template is exactly the revoked path
    #[default]
    Exact,
    /// Remove every pattern whose template is matched by the revoked path,
    /// so revoking `/data/:id` also drops an earlier `/data/:name` grant
    Subsumed,
}

impl FromStr for RevocationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(RevocationMode::Exact),
            "subsumed" => Ok(RevocationMode::Subsumed),
            other => Err(format!(
                "unknown revocation mode '{}', expected 'exact' or 'subsumed'",
                other
            )),
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The route was granted literally; carries its caveats (possibly none)
    Exact(Vec<String>),
    /// A path pattern covers the route
    Pattern,
    /// Nothing covers the route
    Denied,
}

impl Decision {
    pub fn is_authorized(&self) -> bool {
        !matches!(self, Decision::Denied)
    }

    /// Caveats to append to a token minted under this decision
    pub fn extra_caveats(&self) -> &[String] {
        match self {
            Decision::Exact(caveats) => caveats,
            Decision::Pattern | Decision::Denied => &[],
        }
    }

    pub fn into_extra_caveats(self) -> Vec<String> {
        match self {
            Decision::Exact(caveats) => caveats,
            Decision::Pattern | Decision::Denied => Vec::new(),
        }
    }
}

/// Per-container grants
#[derive(Debug, Clone, Default)]
pub struct PermissionIndex {
    caveats: IndexMap<Route, Vec<String>>,
    patterns: HashMap<TargetMethod, Vec<PathPattern>>,
}

impl PermissionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `route`, appending `caveats` to whatever it already carries
    ///
    /// Also registers `route.path` as a pattern for the route's target and
    /// method. Identical patterns are not deduplicated. Returns the full caveat
    /// list now attached to the route.
    pub fn grant(&mut self, route: &Route, caveats: &[String]) -> Result<Vec<String>> {
        route.validate()?;
        // Compile first so a bad template leaves the index untouched
        let pattern = PathPattern::compile(route.path.clone())?;

        self.patterns
            .entry(route.target_method())
            .or_default()
            .push(pattern);

        let stored = self.caveats.entry(route.clone()).or_default();
        stored.extend(caveats.iter().cloned());

        debug!(route = %route, added = caveats.len(), total = stored.len(), "Granted route");

        Ok(stored.clone())
    }

    /// Revoke `route`, either entirely or by removing specific caveats
    ///
    /// Patterns for the route's bucket are always pruned according to `mode`.
    /// With an empty `to_remove` the exact route entry is deleted and `None` is
    /// returned; otherwise the surviving caveats are returned in their original
    /// order.
    pub fn revoke(
        &mut self,
        route: &Route,
        to_remove: &[String],
        mode: RevocationMode,
    ) -> Result<Option<Vec<String>>> {
        route.validate()?;
        let wanted = match mode {
            RevocationMode::Exact => None,
            RevocationMode::Subsumed => Some(PathPattern::compile(route.path.clone())?),
        };

        let bucket = route.target_method();
        if let Some(patterns) = self.patterns.get_mut(&bucket) {
            let before = patterns.len();
            patterns.retain(|p| match &wanted {
                None => p.template() != route.path,
                Some(wanted) => !wanted.matches(p.template()),
            });
            debug!(route = %route, removed = before - patterns.len(), "Pruned path patterns");
            if patterns.is_empty() {
                self.patterns.remove(&bucket);
            }
        }

        if to_remove.is_empty() {
            self.caveats.shift_remove(route);
            return Ok(None);
        }

        let remaining = match self.caveats.get_mut(route) {
            Some(stored) => {
                stored.retain(|c| !to_remove.contains(c));
                stored.clone()
            }
            None => Vec::new(),
        };

        Ok(Some(remaining))
    }

    /// Decide whether `route` may be called
    pub fn authorize(&self, route: &Route) -> Decision {
        if let Some(caveats) = self.caveats.get(route) {
            return Decision::Exact(caveats.clone());
        }

        let covered = self
            .patterns
            .get(&route.target_method())
            .is_some_and(|patterns| patterns.iter().any(|p| p.matches(&route.path)));

        if covered {
            Decision::Pattern
        } else {
            Decision::Denied
        }
    }

    /// Routes granted literally, in grant order
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.caveats.keys()
    }

    /// Number of stored patterns for a target and method
    pub fn pattern_count(&self, target: &str, method: &str) -> usize {
        let bucket = TargetMethod {
            target: target.to_string(),
            method: method.to_string(),
        };
        self.patterns.get(&bucket).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.caveats.is_empty() && self.patterns.is_empty()
    }

    /// Check a route, turning denial into an error
    pub fn require(&self, route: &Route) -> Result<Vec<String>> {
        match self.authorize(route) {
            Decision::Denied => Err(CoreError::InsufficientPermissions),
            decision => Ok(decision.into_extra_caveats()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caveats(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grant_then_authorize_exact() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");

        let stored = index.grant(&route, &caveats(&["time < 2099"])).unwrap();
        assert_eq!(stored, caveats(&["time < 2099"]));

        assert_eq!(
            index.authorize(&route),
            Decision::Exact(caveats(&["time < 2099"]))
        );
    }

    #[test]
    fn test_grants_accumulate_in_order() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");

        index.grant(&route, &caveats(&["a", "b"])).unwrap();
        let stored = index.grant(&route, &caveats(&["c", "a"])).unwrap();

        assert_eq!(stored, caveats(&["a", "b", "c", "a"]));
        assert_eq!(index.pattern_count("store-x", "GET"), 2);
    }

    #[test]
    fn test_empty_grant_still_authorizes_exactly() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");

        assert!(index.grant(&route, &[]).unwrap().is_empty());
        assert_eq!(index.authorize(&route), Decision::Exact(vec![]));
    }

    #[test]
    fn test_pattern_grant_has_no_extra_caveats() {
        let mut index = PermissionIndex::new();
        index
            .grant(&Route::new("store-x", "/foo/:id", "GET"), &caveats(&["x"]))
            .unwrap();

        let concrete = Route::new("store-x", "/foo/123", "GET");
        let decision = index.authorize(&concrete);
        assert_eq!(decision, Decision::Pattern);
        assert!(decision.extra_caveats().is_empty());

        assert_eq!(
            index.authorize(&Route::new("store-x", "/bar/123", "GET")),
            Decision::Denied
        );
        assert_eq!(
            index.authorize(&Route::new("store-x", "/foo/123", "POST")),
            Decision::Denied
        );
        assert_eq!(
            index.authorize(&Route::new("store-y", "/foo/123", "GET")),
            Decision::Denied
        );
    }

    #[test]
    fn test_full_revoke_removes_route() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");
        index.grant(&route, &caveats(&["a"])).unwrap();

        let result = index.revoke(&route, &[], RevocationMode::Exact).unwrap();
        assert!(result.is_none());
        assert_eq!(index.authorize(&route), Decision::Denied);
        assert!(index.is_empty());
    }

    #[test]
    fn test_full_revoke_leaves_other_patterns() {
        let mut index = PermissionIndex::new();
        let literal = Route::new("store-x", "/foo/1", "GET");
        index.grant(&literal, &[]).unwrap();
        index
            .grant(&Route::new("store-x", "/foo/:id", "GET"), &[])
            .unwrap();

        index.revoke(&literal, &[], RevocationMode::Exact).unwrap();

        assert_eq!(index.authorize(&literal), Decision::Pattern);
    }

    #[test]
    fn test_partial_revoke_keeps_order() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");
        index.grant(&route, &caveats(&["a", "b", "c", "d"])).unwrap();

        let remaining = index
            .revoke(&route, &caveats(&["c", "a", "zzz"]), RevocationMode::Exact)
            .unwrap();
        assert_eq!(remaining, Some(caveats(&["b", "d"])));
        assert_eq!(index.authorize(&route), Decision::Exact(caveats(&["b", "d"])));
    }

    #[test]
    fn test_partial_revoke_of_unknown_route_grants_nothing() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");

        let remaining = index
            .revoke(&route, &caveats(&["a"]), RevocationMode::Exact)
            .unwrap();
        assert_eq!(remaining, Some(vec![]));
        assert_eq!(index.authorize(&route), Decision::Denied);
    }

    #[test]
    fn test_exact_mode_only_drops_identical_template() {
        let mut index = PermissionIndex::new();
        index
            .grant(&Route::new("store-x", "/foo/:name", "GET"), &[])
            .unwrap();

        index
            .revoke(&Route::new("store-x", "/foo/:id", "GET"), &[], RevocationMode::Exact)
            .unwrap();

        assert_eq!(index.pattern_count("store-x", "GET"), 1);
        assert_eq!(
            index.authorize(&Route::new("store-x", "/foo/7", "GET")),
            Decision::Pattern
        );
    }

    #[test]
    fn test_subsumed_mode_drops_matched_templates() {
        let mut index = PermissionIndex::new();
        index
            .grant(&Route::new("store-x", "/foo/:name", "GET"), &[])
            .unwrap();
        index
            .grant(&Route::new("store-x", "/foo/1", "GET"), &[])
            .unwrap();
        index
            .grant(&Route::new("store-x", "/bar", "GET"), &[])
            .unwrap();

        index
            .revoke(
                &Route::new("store-x", "/foo/:id", "GET"),
                &[],
                RevocationMode::Subsumed,
            )
            .unwrap();

        assert_eq!(index.pattern_count("store-x", "GET"), 1);
        assert_eq!(
            index.authorize(&Route::new("store-x", "/foo/7", "GET")),
            Decision::Denied
        );
        // The literal grant for /foo/1 survives in the exact map
        assert!(index
            .authorize(&Route::new("store-x", "/foo/1", "GET"))
            .is_authorized());
    }

    #[test]
    fn test_invalid_template_leaves_index_untouched() {
        let mut index = PermissionIndex::new();
        let err = index
            .grant(&Route::new("store-x", "/foo/(bar", "GET"), &caveats(&["a"]))
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidPattern { .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_require() {
        let mut index = PermissionIndex::new();
        let route = Route::new("store-x", "/data", "GET");
        assert!(matches!(
            index.require(&route),
            Err(CoreError::InsufficientPermissions)
        ));

        index.grant(&route, &caveats(&["a"])).unwrap();
        assert_eq!(index.require(&route).unwrap(), caveats(&["a"]));
    }

    #[test]
    fn test_revocation_mode_parse() {
        assert_eq!("exact".parse::<RevocationMode>(), Ok(RevocationMode::Exact));
        assert_eq!(
            "Subsumed".parse::<RevocationMode>(),
            Ok(RevocationMode::Subsumed)
        );
        assert!("fuzzy".parse::<RevocationMode>().is_err());
    }
}
