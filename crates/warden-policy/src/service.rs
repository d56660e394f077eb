//! Snapshot publishing.
//!
//! [`PolicyService`] holds the current [`PolicySnapshot`] behind an
//! `ArcSwap`. Readers load it without locking and keep their `Arc` for the
//! whole decision; reloads and edits build a new snapshot and swap it in.

use std::sync::Arc;

use arc_swap::ArcSwap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use warden_core::{ResourceRequest, Subject};
use warden_storage::Locator;

use crate::builder::PolicyBuilder;
use crate::distributor::{MergedPolicyView, PolicyDistributor};
use crate::document::PolicyDocument;
use crate::engine::{AuthorizationEngine, Decision, EngineConfig};
use crate::error::{PolicyError, PolicyResult};
use crate::operation::OperationRequest;
use crate::reload::{PolicyChange, PolicyChangeNotifier};

/// One immutable, published state of the policy.
#[derive(Debug)]
pub struct PolicySnapshot {
    pub view: Arc<MergedPolicyView>,
    pub engine: AuthorizationEngine,
    /// Starts at 1 and increases with every publish.
    pub generation: u64,
    pub loaded_at: OffsetDateTime,
}

impl PolicySnapshot {
    fn new(view: MergedPolicyView, config: &EngineConfig, generation: u64) -> Self {
        let view = Arc::new(view);
        Self {
            engine: AuthorizationEngine::new(view.clone(), config.clone()),
            view,
            generation,
            loaded_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        self.view.fingerprint()
    }
}

/// Publishes policy snapshots and serializes writers.
pub struct PolicyService {
    distributor: PolicyDistributor,
    root: Locator,
    config: EngineConfig,
    current: ArcSwap<PolicySnapshot>,
    /// Held by reloads and edits so publishes happen in load order.
    writer: Mutex<()>,
    notifier: Arc<PolicyChangeNotifier>,
}

impl PolicyService {
    /// Perform the first load and publish generation 1.
    ///
    /// # Errors
    ///
    /// Returns the root document's load or parse error.
    pub async fn open(
        distributor: PolicyDistributor,
        root: Locator,
        config: EngineConfig,
    ) -> PolicyResult<Self> {
        let view = distributor.load(&root).await?;
        let snapshot = PolicySnapshot::new(view, &config, 1);
        tracing::info!(
            root = %root,
            fingerprint = %snapshot.fingerprint(),
            "Policy service opened"
        );
        Ok(Self {
            distributor,
            root,
            config,
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
            notifier: Arc::new(PolicyChangeNotifier::default()),
        })
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<PolicyChangeNotifier> {
        &self.notifier
    }

    #[must_use]
    pub fn root(&self) -> &Locator {
        &self.root
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    #[must_use]
    pub fn authorize(&self, subject: &Subject, request: &ResourceRequest) -> Decision {
        self.current.load().engine.authorize(subject, request)
    }

    #[must_use]
    pub fn authorize_operation(&self, subject: &Subject, operation: &OperationRequest) -> Decision {
        self.current.load().engine.authorize_operation(subject, operation)
    }

    /// Load every document again and publish the result.
    ///
    /// On failure the previous snapshot stays published and the error is returned.
    pub async fn reload(&self) -> PolicyResult<Arc<PolicySnapshot>> {
        let _guard = self.writer.lock().await;
        self.reload_locked(false)
            .await
            .map(|published| published.unwrap_or_else(|| self.snapshot()))
    }

    /// Like [`PolicyService::reload`], but only publishes when the combined
    /// fingerprint differs. Returns `None` when nothing changed.
    pub async fn reload_if_changed(&self) -> PolicyResult<Option<Arc<PolicySnapshot>>> {
        let _guard = self.writer.lock().await;
        self.reload_locked(true).await
    }

    /// Edit the root document and publish the result.
    ///
    /// The root is re-read under the writer lock so concurrent edits never
    /// lose each other's changes.
    pub async fn edit_root<F>(&self, edit: F) -> PolicyResult<Arc<PolicySnapshot>>
    where
        F: FnOnce(&mut PolicyBuilder) -> PolicyResult<()>,
    {
        let _guard = self.writer.lock().await;
        let registry = self.distributor.registry();

        let text = registry
            .read(&self.root)
            .await
            .map_err(|e| PolicyError::load(self.root.as_str(), e))?;
        let document = PolicyDocument::parse_named(self.root.as_str(), &text)?;

        let mut builder = PolicyBuilder::from(document);
        edit(&mut builder)?;
        let updated = builder.build();

        let text = updated.write_checked(self.root.as_str())?;
        registry
            .write(&self.root, &text)
            .await
            .map_err(|e| PolicyError::load(self.root.as_str(), e))?;
        tracing::info!(root = %self.root, "Root policy edited");

        self.reload_locked(false)
            .await
            .map(|published| published.unwrap_or_else(|| self.snapshot()))
    }

    async fn reload_locked(&self, only_if_changed: bool) -> PolicyResult<Option<Arc<PolicySnapshot>>> {
        let current = self.snapshot();

        let view = match self.distributor.load(&self.root).await {
            Ok(view) => view,
            Err(e) => {
                tracing::error!(
                    root = %self.root,
                    error = %e,
                    category = e.category(),
                    generation = current.generation,
                    "Policy reload failed, keeping current snapshot"
                );
                self.notifier.notify(PolicyChange::ReloadFailed {
                    generation: current.generation,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if only_if_changed && view.fingerprint() == current.fingerprint() {
            return Ok(None);
        }

        let snapshot = Arc::new(PolicySnapshot::new(view, &self.config, current.generation + 1));
        self.current.store(snapshot.clone());

        tracing::info!(
            generation = snapshot.generation,
            fingerprint = %snapshot.fingerprint(),
            "Policy snapshot published"
        );
        self.notifier.notify(PolicyChange::Reloaded {
            generation: snapshot.generation,
            fingerprint: snapshot.fingerprint().to_string(),
        });

        Ok(Some(snapshot))
    }
}

impl std::fmt::Debug for PolicyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyService")
            .field("root", &self.root)
            .field("generation", &self.current.load().generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Action, ObjectPath};
    use warden_storage::{InMemoryStorage, StorageRegistry};

    const ROOT: &str = "mem://policies/root.ini";

    async fn open(storage: &InMemoryStorage) -> PolicyService {
        let registry = StorageRegistry::new().with_backend("mem", Arc::new(storage.clone()));
        PolicyService::open(
            PolicyDistributor::new(registry),
            Locator::parse(ROOT).unwrap(),
            EngineConfig::default(),
        )
        .await
        .unwrap()
    }

    fn select_orders() -> ResourceRequest {
        ResourceRequest::object(
            ObjectPath::for_table("server1", "sales", "orders"),
            Action::Select,
        )
    }

    #[tokio::test]
    async fn test_open_publishes_generation_one() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n[roles]\nr = server=server1->db=sales\n");
        let service = open(&storage).await;
        assert_eq!(service.snapshot().generation, 1);
        assert!(service.authorize(&Subject::new(["g"]), &select_orders()).is_allowed());
    }

    #[tokio::test]
    async fn test_open_fails_without_root() {
        let storage = InMemoryStorage::new();
        let registry = StorageRegistry::new().with_backend("mem", Arc::new(storage));
        let result = PolicyService::open(
            PolicyDistributor::new(registry),
            Locator::parse(ROOT).unwrap(),
            EngineConfig::default(),
        )
        .await;
        assert!(result.unwrap_err().is_load());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_snapshot() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n[roles]\nr = server=server1->db=sales\n");
        let service = open(&storage).await;
        let mut events = service.notifier().subscribe();

        storage.insert(ROOT, "[groups]\nbroken line\n");
        assert!(service.reload().await.unwrap_err().is_malformed());
        assert_eq!(service.snapshot().generation, 1);
        assert!(service.authorize(&Subject::new(["g"]), &select_orders()).is_allowed());
        assert!(events.recv().await.unwrap().is_failure());
    }

    #[tokio::test]
    async fn test_reload_if_changed_skips_identical_content() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[roles]\nr = server=server1\n");
        let service = open(&storage).await;

        assert!(service.reload_if_changed().await.unwrap().is_none());
        storage.insert(ROOT, "[roles]\nr = server=server1->action=select\n");
        let published = service.reload_if_changed().await.unwrap().unwrap();
        assert_eq!(published.generation, 2);

        // unconditional reload always publishes
        assert_eq!(service.reload().await.unwrap().generation, 3);
    }

    #[tokio::test]
    async fn test_edit_root_writes_and_publishes() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n");
        let service = open(&storage).await;
        let held = service.snapshot();

        service
            .edit_root(|builder| {
                builder.add_permissions_to_role("r", ["server=server1->db=sales->action=select"])?;
                Ok(())
            })
            .await
            .unwrap();

        let subject = Subject::new(["g"]);
        assert!(service.authorize(&subject, &select_orders()).is_allowed());
        // a reader holding the old snapshot keeps its old answer
        assert!(held.engine.authorize(&subject, &select_orders()).is_denied());
        assert!(storage.get(ROOT).unwrap().contains("r = server=server1->db=sales->action=select"));
    }

    #[tokio::test]
    async fn test_uri_with_comma_survives_repeated_edits() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n");
        let service = open(&storage).await;

        service
            .edit_root(|builder| {
                builder.add_permissions_to_role(
                    "r",
                    ["server=server1->db=d", "server=server1->uri=file:///data/a,b"],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(storage.get(ROOT).unwrap().contains("uri=file:///data/a%2Cb"));

        let next = service.edit_root(|_| Ok(())).await.unwrap();
        assert_eq!(next.generation, 3);
        assert_eq!(service.reload().await.unwrap().generation, 4);
    }

    #[tokio::test]
    async fn test_unwritable_names_never_reach_storage() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n");
        let service = open(&storage).await;

        for role in ["a,b", "#ops", "[ops]"] {
            let err = service
                .edit_root(|builder| {
                    builder.add_permissions_to_role(role, ["server=server1->db=d"])?;
                    Ok(())
                })
                .await
                .unwrap_err();
            assert!(matches!(err, PolicyError::InvalidName { .. }), "{role}: {err}");
        }
        assert!(matches!(
            service
                .edit_root(|builder| {
                    builder.add_roles_to_group("g", ["a,b"])?;
                    Ok(())
                })
                .await,
            Err(PolicyError::InvalidName { .. })
        ));

        assert_eq!(storage.get(ROOT).unwrap(), "[groups]\ng = r\n");
        assert_eq!(service.snapshot().generation, 1);
        assert_eq!(service.edit_root(|_| Ok(())).await.unwrap().generation, 2);
    }

    #[tokio::test]
    async fn test_failed_edit_changes_nothing() {
        let storage = InMemoryStorage::new();
        storage.insert(ROOT, "[groups]\ng = r\n");
        let service = open(&storage).await;

        let err = service
            .edit_root(|builder| {
                builder.add_permissions_to_role("r", ["not a permission"])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidPermission { .. }));
        assert_eq!(storage.get(ROOT).unwrap(), "[groups]\ng = r\n");
        assert_eq!(service.snapshot().generation, 1);
    }
}
