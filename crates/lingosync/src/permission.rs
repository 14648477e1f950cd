//! Permission capability consulted by the API facade before every mutation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Write a target directly.
    Translate,
    Suggest,
    /// Accept or reject suggestions.
    Review,
    /// Commit to and update from version control.
    Commit,
    /// Merge uploads without routing changes to suggestions.
    Overwrite,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Translate => "translate",
            Permission::Suggest => "suggest",
            Permission::Review => "review",
            Permission::Commit => "commit",
            Permission::Overwrite => "overwrite",
        };
        write!(f, "{}", name)
    }
}

pub trait PermissionChecker: Send + Sync {
    fn has_permission(&self, principal: &str, action: Permission, pootle_path: &str) -> bool;
}

/// Grants everything. The CLI runs with it, as the local user owns the files.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn has_permission(&self, _principal: &str, _action: Permission, _pootle_path: &str) -> bool {
        true
    }
}

/// Explicit grants per principal, scoped by pootle path prefix.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    grants: RwLock<HashMap<String, Vec<(String, HashSet<Permission>)>>>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `actions` to `principal` on everything under `prefix`.
    pub fn grant(&self, principal: &str, prefix: &str, actions: &[Permission]) -> &Self {
        self.grants
            .write()
            .entry(principal.to_string())
            .or_default()
            .push((prefix.to_string(), actions.iter().copied().collect()));
        self
    }
}

impl PermissionChecker for StaticPermissions {
    fn has_permission(&self, principal: &str, action: Permission, pootle_path: &str) -> bool {
        self.grants
            .read()
            .get(principal)
            .map_or(false, |scopes| {
                scopes
                    .iter()
                    .any(|(prefix, actions)| pootle_path.starts_with(prefix.as_str()) && actions.contains(&action))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.has_permission("anyone", Permission::Overwrite, "/sw/demo/app.po"));
    }

    #[test]
    fn test_static_grants_are_prefix_scoped() {
        let perms = StaticPermissions::new();
        perms
            .grant("amina", "/sw/", &[Permission::Translate, Permission::Suggest])
            .grant("bakari", "/sw/demo/", &[Permission::Suggest]);

        assert!(perms.has_permission("amina", Permission::Translate, "/sw/demo/app.po"));
        assert!(!perms.has_permission("amina", Permission::Commit, "/sw/demo/app.po"));
        assert!(perms.has_permission("bakari", Permission::Suggest, "/sw/demo/app.po"));
        assert!(!perms.has_permission("bakari", Permission::Suggest, "/fr/demo/app.po"));
        assert!(!perms.has_permission("nobody", Permission::Suggest, "/sw/demo/app.po"));
    }
}
