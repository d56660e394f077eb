//! Readers, writers and the watcher running side by side.

use std::sync::Arc;
use std::time::Duration;

use warden_core::{Action, ObjectPath, ResourceRequest, Subject};
use warden_policy::{
    EngineConfig, PolicyChange, PolicyDistributor, PolicyService, PolicyWatcher, ReloadConfig,
};
use warden_storage::{InMemoryStorage, Locator, StorageRegistry};

const ROOT: &str = "mem://policies/root.ini";

async fn open(store: &InMemoryStorage) -> Arc<PolicyService> {
    let registry = StorageRegistry::new().with_backend("mem", Arc::new(store.clone()));
    let service = PolicyService::open(
        PolicyDistributor::new(registry),
        Locator::parse(ROOT).unwrap(),
        EngineConfig::default(),
    )
    .await
    .unwrap();
    Arc::new(service)
}

fn select(table: &str) -> ResourceRequest {
    ResourceRequest::object(ObjectPath::for_table("server1", "sales", table), Action::Select)
}

/// Poll until `check` holds or a second passes.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_partial_edit() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[groups]\nanalysts = reader\n[roles]\nreader =\n");
    let service = open(&store).await;
    let subject = Subject::new(["analysts"]);

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let subject = subject.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let snapshot = service.snapshot();
                    let orders = snapshot.engine.authorize(&subject, &select("orders"));
                    let returns = snapshot.engine.authorize(&subject, &select("returns"));
                    // both tables are granted in one edit
                    assert_eq!(orders.is_allowed(), returns.is_allowed());
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    service
        .edit_root(|builder| {
            builder.add_permissions_to_role(
                "reader",
                [
                    "server=server1->db=sales->table=orders->action=select",
                    "server=server1->db=sales->table=returns->action=select",
                ],
            )?;
            Ok(())
        })
        .await
        .unwrap();

    for reader in readers {
        reader.await.unwrap();
    }
    assert!(service.authorize(&subject, &select("orders")).is_allowed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_edits_are_not_lost() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[groups]\nanalysts = reader\n");
    let service = open(&store).await;

    let edits: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let permission = format!("server=server1->db=sales->table=t{i}->action=select");
                service
                    .edit_root(move |builder| {
                        builder.add_permissions_to_role("reader", [permission])?;
                        Ok(())
                    })
                    .await
                    .unwrap();
            })
        })
        .collect();
    for edit in edits {
        edit.await.unwrap();
    }

    let snapshot = service.snapshot();
    assert_eq!(snapshot.generation, 11);
    let subject = Subject::new(["analysts"]);
    for i in 0..10 {
        assert!(snapshot
            .engine
            .authorize(&subject, &select(&format!("t{i}")))
            .is_allowed());
    }
}

#[tokio::test]
async fn watcher_publishes_external_changes() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[groups]\nanalysts = reader\n[roles]\nreader =\n");
    let service = open(&store).await;
    let mut events = service.notifier().subscribe();

    let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::for_testing());
    let stats = watcher.stats();
    let handle = watcher.spawn();

    store.insert(
        ROOT,
        "[groups]\nanalysts = reader\n[roles]\nreader = server=server1->db=sales\n",
    );

    let subject = Subject::new(["analysts"]);
    assert!(eventually(|| service.authorize(&subject, &select("orders")).is_allowed()).await);

    match events.recv().await.unwrap() {
        PolicyChange::Reloaded { generation, .. } => assert_eq!(generation, 2),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(stats.snapshot().successful >= 1);

    handle.stop().await;
}

#[tokio::test]
async fn zero_interval_watcher_keeps_polling() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[groups]\nanalysts = reader\n[roles]\nreader =\n");
    let service = open(&store).await;

    let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::with_interval(Duration::ZERO));
    let stats = watcher.stats();
    let handle = watcher.spawn();

    store.insert(
        ROOT,
        "[groups]\nanalysts = reader\n[roles]\nreader = server=server1->db=sales\n",
    );

    let subject = Subject::new(["analysts"]);
    assert!(eventually(|| service.authorize(&subject, &select("orders")).is_allowed()).await);
    assert!(stats.snapshot().successful >= 1);
    assert!(!handle.is_finished());

    handle.stop().await;
}

#[tokio::test]
async fn malformed_root_keeps_the_last_good_snapshot() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[groups]\nanalysts = reader\n[roles]\nreader = server=server1->db=sales\n");
    let service = open(&store).await;

    let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::for_testing());
    let stats = watcher.stats();
    let handle = watcher.spawn();

    store.insert(ROOT, "[roles\nreader = server=server1\n");
    assert!(eventually(|| stats.snapshot().failed >= 1).await);

    let subject = Subject::new(["analysts"]);
    assert_eq!(service.snapshot().generation, 1);
    assert!(service.authorize(&subject, &select("orders")).is_allowed());

    handle.stop().await;
}

#[tokio::test]
async fn check_once_skips_unchanged_policy() {
    let store = InMemoryStorage::new();
    store.insert(ROOT, "[roles]\nreader = server=server1\n");
    let service = open(&store).await;

    let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::default());
    watcher.check_once().await;
    watcher.check_once().await;

    let stats = watcher.stats().snapshot();
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.successful, 0);
    assert_eq!(service.snapshot().generation, 1);
}
