//! Loading and merging the root document with its per-database documents.

use std::collections::BTreeMap;
use std::fmt;

use futures_util::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use warden_core::Component;
use warden_storage::{Locator, StorageRegistry};

use crate::document::PolicyDocument;
use crate::error::{PolicyError, PolicyResult, UnknownRoleReference};

/// SHA-256 of a document's text, hex encoded.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

// =============================================================================
// Merged View
// =============================================================================

/// Which document a grant came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum DocumentScope {
    Root,
    Database(String),
}

impl fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Database(name) => write!(f, "db:{name}"),
        }
    }
}

/// Outcome of loading one per-database document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabasePolicy {
    Loaded {
        locator: String,
        /// Already scoped to its database.
        document: PolicyDocument,
        fingerprint: String,
        /// Permissions removed for addressing something outside the database.
        dropped: usize,
    },
    /// Reading or parsing failed. Only this database is affected.
    Unavailable { locator: String, reason: String },
}

impl DatabasePolicy {
    #[must_use]
    pub fn locator(&self) -> &str {
        match self {
            Self::Loaded { locator, .. } | Self::Unavailable { locator, .. } => locator,
        }
    }

    #[must_use]
    pub fn document(&self) -> Option<&PolicyDocument> {
        match self {
            Self::Loaded { document, .. } => Some(document),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Read-only result of one distributor load.
#[derive(Debug, Clone)]
pub struct MergedPolicyView {
    root_locator: Locator,
    root: PolicyDocument,
    root_fingerprint: String,
    databases: BTreeMap<String, DatabasePolicy>,
    fingerprint: String,
}

impl MergedPolicyView {
    /// Build a view from an in-memory root document with no per-database documents.
    #[must_use]
    pub fn from_root(root_locator: Locator, root: PolicyDocument) -> Self {
        let root_fingerprint = fingerprint(&root.write());
        let databases = BTreeMap::new();
        let combined = combined_fingerprint(&root_fingerprint, &databases);
        Self {
            root_locator,
            root,
            root_fingerprint,
            databases,
            fingerprint: combined,
        }
    }

    #[must_use]
    pub fn root_locator(&self) -> &Locator {
        &self.root_locator
    }

    #[must_use]
    pub fn root(&self) -> &PolicyDocument {
        &self.root
    }

    #[must_use]
    pub fn root_fingerprint(&self) -> &str {
        &self.root_fingerprint
    }

    #[must_use]
    pub fn databases(&self) -> &BTreeMap<String, DatabasePolicy> {
        &self.databases
    }

    #[must_use]
    pub fn database(&self, name: &str) -> Option<&DatabasePolicy> {
        self.databases.get(&name.to_ascii_lowercase())
    }

    /// Databases whose document failed, with the failure reason.
    pub fn unavailable_databases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.databases.iter().filter_map(|(name, policy)| match policy {
            DatabasePolicy::Unavailable { reason, .. } => Some((name.as_str(), reason.as_str())),
            DatabasePolicy::Loaded { .. } => None,
        })
    }

    /// The root document followed by every loaded per-database document.
    pub fn documents(&self) -> impl Iterator<Item = (DocumentScope, &PolicyDocument)> {
        std::iter::once((DocumentScope::Root, &self.root)).chain(self.databases.iter().filter_map(
            |(name, policy)| {
                policy
                    .document()
                    .map(|document| (DocumentScope::Database(name.clone()), document))
            },
        ))
    }

    /// Undefined role references in the root and every loaded per-database document.
    #[must_use]
    pub fn unknown_role_references(&self) -> Vec<(DocumentScope, UnknownRoleReference)> {
        self.documents()
            .flat_map(|(scope, document)| {
                document
                    .unknown_role_references()
                    .into_iter()
                    .map(move |reference| (scope.clone(), reference))
            })
            .collect()
    }

    /// Combined fingerprint over every document; changes when any one does.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn combined_fingerprint(root: &str, databases: &BTreeMap<String, DatabasePolicy>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.as_bytes());
    for (name, policy) in databases {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        match policy {
            DatabasePolicy::Loaded { fingerprint, .. } => hasher.update(fingerprint.as_bytes()),
            DatabasePolicy::Unavailable { locator, .. } => {
                hasher.update(b"unavailable:");
                hasher.update(locator.as_bytes());
            }
        }
    }
    hex::encode(hasher.finalize())
}

// =============================================================================
// Distributor
// =============================================================================

/// Fetches the root document and every per-database document it lists.
#[derive(Debug, Clone)]
pub struct PolicyDistributor {
    registry: StorageRegistry,
}

impl PolicyDistributor {
    #[must_use]
    pub fn new(registry: StorageRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    /// Load and merge all documents reachable from `root`.
    ///
    /// # Errors
    ///
    /// Fails only if the root document cannot be read or is malformed.
    /// Per-database failures are recorded in the view instead.
    pub async fn load(&self, root: &Locator) -> PolicyResult<MergedPolicyView> {
        let text = self
            .registry
            .read(root)
            .await
            .map_err(|e| PolicyError::load(root.as_str(), e))?;
        let document = PolicyDocument::parse_named(root.as_str(), &text)?;

        let loads = document
            .databases()
            .iter()
            .map(|(name, raw)| self.load_database(root, name, raw));
        let databases: BTreeMap<String, DatabasePolicy> = join_all(loads).await.into_iter().collect();

        let root_fingerprint = fingerprint(&text);
        let combined = combined_fingerprint(&root_fingerprint, &databases);

        let unavailable = databases.values().filter(|p| !p.is_available()).count();
        let short_fingerprint = &combined[..12];
        info!(
            locator = %root,
            databases = databases.len(),
            unavailable,
            roles = document.roles().len(),
            fingerprint = short_fingerprint,
            "Policy loaded"
        );

        let view = MergedPolicyView {
            root_locator: root.clone(),
            root: document,
            root_fingerprint,
            databases,
            fingerprint: combined,
        };
        for (scope, reference) in view.unknown_role_references() {
            warn!(
                locator = %root,
                scope = %scope,
                group = %reference.group,
                role = %reference.role,
                "Group references an undefined role"
            );
        }
        Ok(view)
    }

    async fn load_database(&self, root: &Locator, name: &str, raw: &str) -> (String, DatabasePolicy) {
        let unavailable = |locator: String, reason: String| {
            warn!(database = name, %locator, %reason, "Per-database policy unavailable");
            (
                name.to_string(),
                DatabasePolicy::Unavailable { locator, reason },
            )
        };

        let locator = match Locator::parse(raw) {
            Ok(locator) => locator.resolve_against(root),
            Err(e) => return unavailable(raw.to_string(), e.to_string()),
        };

        let text = match self.registry.read(&locator).await {
            Ok(text) => text,
            Err(e) => {
                let error = PolicyError::load(locator.as_str(), e);
                return unavailable(locator.to_string(), error.to_string());
            }
        };

        let scoped = PolicyDocument::parse_named(locator.as_str(), &text)
            .and_then(|document| scope_to_database(name, document));
        match scoped {
            Ok((document, dropped)) => {
                debug!(
                    database = name,
                    locator = %locator,
                    roles = document.roles().len(),
                    dropped,
                    "Per-database policy loaded"
                );
                (
                    name.to_string(),
                    DatabasePolicy::Loaded {
                        locator: locator.to_string(),
                        document,
                        fingerprint: fingerprint(&text),
                        dropped,
                    },
                )
            }
            Err(e) => unavailable(locator.to_string(), e.to_string()),
        }
    }
}

/// Restrict a per-database document to grants on `database`.
///
/// Returns the scoped document and the number of permissions dropped.
pub fn scope_to_database(
    database: &str,
    mut document: PolicyDocument,
) -> PolicyResult<(PolicyDocument, usize)> {
    if !document.databases.is_empty() {
        return Err(PolicyError::NestedDatabases {
            database: database.to_string(),
        });
    }

    if !document.users.is_empty() {
        warn!(
            database,
            users = document.users.len(),
            "Ignoring [users] section in per-database policy"
        );
        document.users.clear();
    }

    let own = Component::parse(database);
    let mut dropped = 0;
    for (role, permissions) in &mut document.roles {
        permissions.retain(|permission| {
            let in_scope = permission
                .object()
                .and_then(|path| path.database())
                .is_some_and(|db| *db == own);
            if !in_scope {
                dropped += 1;
                warn!(
                    database,
                    role = %role,
                    permission = %permission,
                    "Dropping permission outside its database"
                );
            }
            in_scope
        });
    }

    Ok((document, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_storage::InMemoryStorage;

    fn registry(storage: &InMemoryStorage) -> StorageRegistry {
        StorageRegistry::new().with_backend("mem", Arc::new(storage.clone()))
    }

    #[test]
    fn test_scope_drops_foreign_permissions() {
        let document = PolicyDocument::parse(
            "[roles]\nr = server=s->db=sales->table=t, server=s->db=hr, server=s->db=*, server=s->uri=file:///x, server=s\n",
        )
        .unwrap();
        let (scoped, dropped) = scope_to_database("sales", document).unwrap();
        assert_eq!(dropped, 4);
        assert_eq!(scoped.permissions_for_role("r").count(), 1);
    }

    #[test]
    fn test_scope_rejects_nested_databases() {
        let document = PolicyDocument::parse("[databases]\nother = x.ini\n").unwrap();
        assert!(matches!(
            scope_to_database("sales", document),
            Err(PolicyError::NestedDatabases { database }) if database == "sales"
        ));
    }

    #[test]
    fn test_scope_ignores_users() {
        let document = PolicyDocument::parse("[users]\nbob = g\n").unwrap();
        let (scoped, _) = scope_to_database("sales", document).unwrap();
        assert!(scoped.users().is_empty());
    }

    #[tokio::test]
    async fn test_load_resolves_relative_locators() {
        let storage = InMemoryStorage::new();
        storage.insert("mem://store/policies/root.ini", "[databases]\nsales = sales.ini\n");
        storage.insert(
            "mem://store/policies/sales.ini",
            "[groups]\ng = r\n[roles]\nr = server=s->db=sales\n",
        );

        let root = Locator::parse("mem://store/policies/root.ini").unwrap();
        let view = PolicyDistributor::new(registry(&storage)).load(&root).await.unwrap();

        let sales = view.database("SALES").unwrap();
        assert!(sales.is_available());
        assert_eq!(sales.locator(), "mem://store/policies/sales.ini");
        assert_eq!(view.documents().count(), 2);
    }

    #[tokio::test]
    async fn test_failed_database_is_isolated() {
        let storage = InMemoryStorage::new();
        storage.insert(
            "mem://p/root.ini",
            "[databases]\nok = mem://p/ok.ini\nbroken = mem://p/broken.ini\nmissing = mem://p/missing.ini\n",
        );
        storage.insert("mem://p/ok.ini", "[roles]\nr = server=s->db=ok\n");
        storage.insert("mem://p/broken.ini", "not a section\n");

        let root = Locator::parse("mem://p/root.ini").unwrap();
        let view = PolicyDistributor::new(registry(&storage)).load(&root).await.unwrap();

        let unavailable: Vec<&str> = view.unavailable_databases().map(|(name, _)| name).collect();
        assert_eq!(unavailable, vec!["broken", "missing"]);
        assert!(view.database("ok").unwrap().is_available());
    }

    #[tokio::test]
    async fn test_unknown_role_references_cover_every_document() {
        let storage = InMemoryStorage::new();
        storage.insert(
            "mem://p/root.ini",
            "[databases]\nsales = mem://p/sales.ini\n[groups]\nops = ghost\n",
        );
        storage.insert("mem://p/sales.ini", "[groups]\nanalysts = missing\n");

        let root = Locator::parse("mem://p/root.ini").unwrap();
        let view = PolicyDistributor::new(registry(&storage)).load(&root).await.unwrap();

        let found: Vec<(DocumentScope, String)> = view
            .unknown_role_references()
            .into_iter()
            .map(|(scope, reference)| (scope, reference.role))
            .collect();
        assert_eq!(
            found,
            vec![
                (DocumentScope::Root, "ghost".to_string()),
                (DocumentScope::Database("sales".into()), "missing".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_root_failures_are_errors() {
        let storage = InMemoryStorage::new();
        let distributor = PolicyDistributor::new(registry(&storage));
        let root = Locator::parse("mem://p/root.ini").unwrap();

        assert!(distributor.load(&root).await.unwrap_err().is_load());

        storage.insert("mem://p/root.ini", "garbage\n");
        assert!(distributor.load(&root).await.unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_every_document() {
        let storage = InMemoryStorage::new();
        storage.insert("mem://p/root.ini", "[databases]\nd = mem://p/d.ini\n");
        storage.insert("mem://p/d.ini", "[roles]\nr = server=s->db=d\n");
        let distributor = PolicyDistributor::new(registry(&storage));
        let root = Locator::parse("mem://p/root.ini").unwrap();

        let first = distributor.load(&root).await.unwrap();
        let again = distributor.load(&root).await.unwrap();
        assert_eq!(first.fingerprint(), again.fingerprint());

        storage.insert("mem://p/d.ini", "[roles]\nr = server=s->db=d->action=select\n");
        let changed = distributor.load(&root).await.unwrap();
        assert_ne!(first.fingerprint(), changed.fingerprint());
        assert_eq!(first.root_fingerprint(), changed.root_fingerprint());
    }
}
