//! Per-database documents held on a remote store.

use std::sync::Arc;

use warden_core::{Action, ObjectPath, ResourceRequest, Subject};
use warden_policy::{
    DenyCode, DocumentScope, EngineConfig, OperationKind, OperationRequest, PolicyDistributor,
    PolicyService,
};
use warden_storage::{InMemoryStorage, Locator, StorageRegistry};

const ROOT: &str = "hdfs://namenode:8020/policies/root.ini";

fn registry(store: &InMemoryStorage) -> StorageRegistry {
    StorageRegistry::new().with_backend("hdfs", Arc::new(store.clone()))
}

async fn open(store: &InMemoryStorage) -> PolicyService {
    PolicyService::open(
        PolicyDistributor::new(registry(store)),
        Locator::parse(ROOT).unwrap(),
        EngineConfig::default(),
    )
    .await
    .unwrap()
}

fn select(db: &str, table: &str) -> ResourceRequest {
    ResourceRequest::object(ObjectPath::for_table("server1", db, table), Action::Select)
}

fn seed(store: &InMemoryStorage) {
    store.insert(
        ROOT,
        "[databases]\n\
         sales = sales.ini\n\
         hr = hdfs://namenode:8020/policies/hr.ini\n\
         [groups]\n\
         admins = root_admin\n\
         [roles]\n\
         root_admin = server=server1->db=hr\n",
    );
    store.insert(
        "hdfs://namenode:8020/policies/sales.ini",
        "[groups]\n\
         analysts = sales_reader\n\
         [roles]\n\
         sales_reader = server=server1->db=sales->table=orders->action=select, \
         server=server1->db=hr->table=salaries->action=select\n",
    );
}

#[tokio::test]
async fn relative_locators_resolve_next_to_the_root() {
    let store = InMemoryStorage::new();
    seed(&store);
    store.insert(
        "hdfs://namenode:8020/policies/hr.ini",
        "[groups]\nhr_staff = hr_reader\n[roles]\nhr_reader = server=server1->db=hr->action=select\n",
    );
    let service = open(&store).await;
    let snapshot = service.snapshot();

    assert!(snapshot.view.database("sales").unwrap().is_available());
    assert!(snapshot.view.database("HR").unwrap().is_available());
    assert_eq!(snapshot.view.documents().count(), 3);
}

#[tokio::test]
async fn database_document_only_grants_inside_its_database() {
    let store = InMemoryStorage::new();
    seed(&store);
    store.insert("hdfs://namenode:8020/policies/hr.ini", "");
    let service = open(&store).await;

    let analysts = Subject::new(["analysts"]);
    assert!(service.authorize(&analysts, &select("sales", "orders")).is_allowed());
    // the hr grant in sales.ini is dropped while loading
    assert!(service.authorize(&analysts, &select("hr", "salaries")).is_denied());

    let effective = service.snapshot().engine.effective_permissions(&analysts);
    assert_eq!(effective.len(), 1);
    assert_eq!(effective[0].source, DocumentScope::Database("sales".into()));
}

#[tokio::test]
async fn failed_database_document_is_reported_as_unavailable() {
    let store = InMemoryStorage::new();
    seed(&store);
    // hr.ini is never written
    let service = open(&store).await;
    let snapshot = service.snapshot();

    let unavailable: Vec<_> = snapshot.view.unavailable_databases().map(|(db, _)| db).collect();
    assert_eq!(unavailable, vec!["hr"]);
    assert!(!snapshot.engine.is_database_available("hr"));

    let analysts = Subject::new(["analysts"]);
    let decision = service.authorize(&analysts, &select("hr", "payroll"));
    assert_eq!(decision.deny_reason().unwrap().code, DenyCode::PolicyUnavailable);
    assert!(decision.is_fault());

    // other databases keep working
    assert!(service.authorize(&analysts, &select("sales", "orders")).is_allowed());
    // root grants on the failed database still apply
    assert!(service.authorize(&Subject::new(["admins"]), &select("hr", "payroll")).is_allowed());

    let use_hr = OperationRequest::new(OperationKind::Use).with_database("hr");
    assert_eq!(
        service
            .authorize_operation(&analysts, &use_hr)
            .deny_reason()
            .unwrap()
            .code,
        DenyCode::PolicyUnavailable
    );
}

#[tokio::test]
async fn nested_databases_section_fails_only_that_database() {
    let store = InMemoryStorage::new();
    seed(&store);
    store.insert(
        "hdfs://namenode:8020/policies/hr.ini",
        "[databases]\nother = other.ini\n",
    );
    let service = open(&store).await;
    let snapshot = service.snapshot();

    assert!(!snapshot.engine.is_database_available("hr"));
    assert!(snapshot.engine.is_database_available("sales"));
}

#[tokio::test]
async fn repairing_a_database_document_is_picked_up() {
    let store = InMemoryStorage::new();
    seed(&store);
    let service = open(&store).await;
    let staff = Subject::new(["hr_staff"]);
    assert!(service.authorize(&staff, &select("hr", "payroll")).is_denied());

    store.insert(
        "hdfs://namenode:8020/policies/hr.ini",
        "[groups]\nhr_staff = hr_reader\n[roles]\nhr_reader = server=server1->db=hr->action=select\n",
    );
    let published = service.reload_if_changed().await.unwrap();
    assert_eq!(published.unwrap().generation, 2);
    assert!(service.authorize(&staff, &select("hr", "payroll")).is_allowed());
}

#[test]
fn distributor_loads_outside_an_async_test() {
    let store = InMemoryStorage::new();
    seed(&store);
    store.insert("hdfs://namenode:8020/policies/hr.ini", "");

    let distributor = PolicyDistributor::new(registry(&store));
    let root = Locator::parse(ROOT).unwrap();
    let view = tokio_test::block_on(distributor.load(&root)).unwrap();

    assert_eq!(view.databases().len(), 2);
    assert_eq!(view.fingerprint().len(), 64);
}
