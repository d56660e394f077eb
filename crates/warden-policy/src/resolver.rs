//! Expansion of permissions into canonical `(path, action)` pairs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};
use warden_core::{Action, Component, ObjectPath, Permission, Resource, UriPath};

/// A resource path in the form used for matching.
///
/// Object paths match through [`ObjectPath::covers`]; URIs through their
/// normalized scheme, authority and segments. The two kinds never cover each
/// other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalPath {
    Object(ObjectPath),
    Uri { server: Component, uri: UriPath },
}

impl CanonicalPath {
    #[must_use]
    pub fn from_resource(resource: &Resource) -> Self {
        match resource {
            Resource::Object(path) => Self::Object(path.clone()),
            Resource::Uri { server, uri } => Self::Uri {
                server: server.clone(),
                uri: uri.clone(),
            },
        }
    }

    /// Returns `true` if a grant on `self` applies to `requested`.
    #[must_use]
    pub fn covers(&self, requested: &CanonicalPath) -> bool {
        match (self, requested) {
            (Self::Object(granted), Self::Object(requested)) => granted.covers(requested),
            (
                Self::Uri {
                    server: granted_server,
                    uri: granted,
                },
                Self::Uri {
                    server: requested_server,
                    uri: requested,
                },
            ) => granted_server.covers(requested_server) && granted.is_prefix_of(requested),
            _ => false,
        }
    }

    /// Returns `true` if two object paths lie on one branch of the hierarchy.
    #[must_use]
    pub fn is_related(&self, other: &CanonicalPath) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.is_related(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_uri(&self) -> bool {
        matches!(self, Self::Uri { .. })
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(path) => write!(f, "{path}"),
            Self::Uri { server, uri } => write!(f, "server={server}->uri={uri}"),
        }
    }
}

impl Serialize for CanonicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One resolved `(path, action)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResolvedGrant {
    pub path: CanonicalPath,
    pub action: Action,
}

impl ResolvedGrant {
    /// Returns `true` if this pair satisfies `action` on `requested`.
    #[must_use]
    pub fn permits(&self, requested: &CanonicalPath, action: Action) -> bool {
        self.action.implies(action) && self.path.covers(requested)
    }
}

/// Expand one permission. `ALL` yields `ALL`, `SELECT` and `INSERT`.
#[must_use]
pub fn resolve(permission: &Permission) -> BTreeSet<ResolvedGrant> {
    let path = CanonicalPath::from_resource(permission.resource());
    permission
        .action()
        .expand()
        .iter()
        .map(|&action| ResolvedGrant {
            path: path.clone(),
            action,
        })
        .collect()
}

/// Expand a set of permissions into their union.
pub fn resolve_all<'a>(permissions: impl IntoIterator<Item = &'a Permission>) -> BTreeSet<ResolvedGrant> {
    permissions.into_iter().flat_map(resolve).collect()
}
