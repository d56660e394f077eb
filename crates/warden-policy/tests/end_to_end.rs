//! Statement-level scenarios against policy files on disk.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use warden_core::{ObjectPath, Subject};
use warden_policy::{
    DenyCode, EngineConfig, OperationKind, OperationRequest, PolicyBuilder, PolicyDistributor,
    PolicyService,
};
use warden_storage::{InMemoryStorage, Locator, StorageRegistry};

const SERVER: &str = "server1";

fn table(db: &str, name: &str) -> ObjectPath {
    ObjectPath::for_table(SERVER, db, name)
}

fn user1() -> Subject {
    Subject::new(["user_group1"])
}

fn user2() -> Subject {
    Subject::new(["user_group2"])
}

async fn write_policy(path: &Path, builder: &PolicyBuilder) {
    tokio::fs::write(path, builder.document().write()).await.unwrap();
}

async fn open(root: &Path, registry: StorageRegistry) -> PolicyService {
    PolicyService::open(
        PolicyDistributor::new(registry),
        Locator::parse(root.to_str().unwrap()).unwrap(),
        EngineConfig::default(),
    )
    .await
    .unwrap()
}

fn op(kind: OperationKind) -> OperationRequest {
    OperationRequest::new(kind)
}

#[tokio::test]
async fn all_on_database_allows_ddl_but_not_create_database() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_permissions_to_role("db1_all", ["server=server1->db=db1"])
        .unwrap()
        .add_permissions_to_role("db2_all", ["server=server1->db=db2"])
        .unwrap()
        .add_roles_to_group("user_group1", ["db1_all", "db2_all"])
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let user = user1();

    for db in ["db1", "db2"] {
        assert!(service
            .authorize_operation(&user, &op(OperationKind::Use).with_database(db))
            .is_allowed());
        assert!(service
            .authorize_operation(&user, &op(OperationKind::CreateTable).with_output(table(db, "t")))
            .is_allowed());
        assert!(service
            .authorize_operation(&user, &op(OperationKind::Query).with_input(table(db, "t")))
            .is_allowed());
        assert!(service
            .authorize_operation(&user, &op(OperationKind::DropDatabase).with_database(db))
            .is_denied());
    }
    assert!(service
        .authorize_operation(&user, &op(OperationKind::CreateDatabase).with_database("db3"))
        .is_denied());
}

#[tokio::test]
async fn select_only_user_is_denied_every_write() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_roles_to_group("user_group1", ["db1_all"])
        .unwrap()
        .add_roles_to_group("user_group2", ["db1_tab1_select"])
        .unwrap()
        .add_permissions_to_role(
            "db1_tab1_select",
            ["server=server1->db=db1->table=table_1->action=select"],
        )
        .unwrap()
        .add_permissions_to_role("db1_all", ["server=server1->db=db1"])
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let user = user2();
    let db = |kind| op(kind).with_database("db1");

    assert!(service.authorize_operation(&user, &db(OperationKind::Use)).is_allowed());
    assert!(service
        .authorize_operation(&user, &op(OperationKind::Query).with_input(table("db1", "table_1")))
        .is_allowed());

    let denied = [
        op(OperationKind::AlterTable).with_output(table("db1", "table_2")),
        db(OperationKind::DropDatabase),
        op(OperationKind::CreateIndex).with_output(table("db1", "table_1")),
        op(OperationKind::CreateFunction),
        db(OperationKind::CreateTable),
        db(OperationKind::CreateTableAsSelect).with_input(table("db1", "table_2")),
        db(OperationKind::CreateTableAsSelect).with_input(table("db1", "table_1")),
        db(OperationKind::AlterDatabase),
        op(OperationKind::AlterView).with_output(table("db1", "v1")),
        db(OperationKind::DropView),
        op(OperationKind::AlterTable).with_output(table("db1", "table_1")),
        op(OperationKind::Insert)
            .with_input(table("db1", "table_1"))
            .with_output(table("db1", "table_2")),
        op(OperationKind::AddPartitionWithLocation)
            .with_output(table("db1", "table_part_1"))
            .with_input_uri("/tmp/base"),
        op(OperationKind::AlterTableSetLocation)
            .with_output(table("db1", "table_part_1"))
            .with_input_uri("/tmp/base"),
    ];
    for request in &denied {
        let decision = service.authorize_operation(&user, request);
        assert!(decision.is_denied(), "{:?} should be denied", request.kind);
        assert_eq!(decision.deny_reason().unwrap().code, DenyCode::MissingPrivilege);
    }
}

#[tokio::test]
async fn create_view_needs_select_on_every_source() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_permissions_to_role("group1_role", ["server=server1->db=db1", "server=server1->db=db2"])
        .unwrap()
        .add_roles_to_group("user_group1", ["group1_role"])
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let user = user1();
    let cross_db_view = op(OperationKind::CreateView)
        .with_database("db1")
        .with_input(table("db1", "tbl1"))
        .with_input(table("db2", "tbl2"));

    assert!(service.authorize_operation(&user, &cross_db_view).is_allowed());

    // revoke ALL on db2 and publish
    service
        .edit_root(|builder| {
            builder.remove_permissions_from_role("group1_role", ["server=server1->db=db2"])?;
            Ok(())
        })
        .await
        .unwrap();
    assert!(service.authorize_operation(&user, &cross_db_view).is_denied());

    service
        .edit_root(|builder| {
            builder.add_permissions_to_role(
                "group1_role",
                ["server=server1->db=db2->table=tbl2->action=select"],
            )?;
            Ok(())
        })
        .await
        .unwrap();
    assert!(service.authorize_operation(&user, &cross_db_view).is_allowed());

    let with_tbl3 = op(OperationKind::CreateView)
        .with_database("db1")
        .with_input(table("db1", "tbl1"))
        .with_input(table("db2", "tbl3"));
    assert!(service.authorize_operation(&user, &with_tbl3).is_denied());
}

#[tokio::test]
async fn ctas_across_databases() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_permissions_to_role(
            "group1_role",
            [
                "server=server1->db=db1",
                "server=server1->db=db2->table=tbl2->action=select",
            ],
        )
        .unwrap()
        .add_roles_to_group("user_group1", ["group1_role"])
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let user = user1();
    let ctas = |source: &str| {
        op(OperationKind::CreateTableAsSelect)
            .with_output(table("db1", "rtab"))
            .with_input(table("db2", source))
    };

    assert!(service.authorize_operation(&user, &ctas("tbl2")).is_allowed());
    assert!(service.authorize_operation(&user, &ctas("tbl3")).is_denied());
}

#[tokio::test]
async fn directory_writes_and_loads_need_uri_grants() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");
    let allowed = dir.path().join("allowed");
    let restricted = dir.path().join("restricted");

    let mut policy = PolicyBuilder::new();
    policy
        .add_roles_to_group("user_group1", ["all_db1", "load_data"])
        .unwrap()
        .add_permissions_to_role("all_db1", ["server=server1->db=db1"])
        .unwrap()
        .add_permissions_to_role(
            "load_data",
            [
                format!("server=server1->uri=file://{}", allowed.display()),
                "server=server1->uri=hdfs://namenode:8020/user/hive/allowed".to_string(),
            ],
        )
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let user = user1();
    let tbl1 = table("db1", "tbl1");

    let overwrite = |target: String| {
        op(OperationKind::InsertOverwriteDirectory)
            .with_input(tbl1.clone())
            .with_output_uri(target)
    };
    let load = |source: String| {
        op(OperationKind::LoadData)
            .with_output(tbl1.clone())
            .with_input_uri(source)
    };

    let allowed_local = format!("file://{}", allowed.display());
    let restricted_local = format!("file://{}", restricted.display());
    let allowed_dfs = "hdfs://namenode:8020/user/hive/allowed/part-0".to_string();
    let restricted_dfs = "hdfs://namenode:8020/user/hive/restricted".to_string();

    assert!(service.authorize_operation(&user, &overwrite(allowed_local.clone())).is_allowed());
    assert!(service.authorize_operation(&user, &overwrite(allowed_dfs.clone())).is_allowed());
    assert!(service.authorize_operation(&user, &load(allowed_local)).is_allowed());
    assert!(service.authorize_operation(&user, &load(allowed_dfs)).is_allowed());
    // bare paths are local files
    assert!(service
        .authorize_operation(&user, &load(allowed.join("data.csv").display().to_string()))
        .is_allowed());

    assert!(service.authorize_operation(&user, &overwrite(restricted_local.clone())).is_denied());
    assert!(service.authorize_operation(&user, &overwrite(restricted_dfs)).is_denied());
    assert!(service.authorize_operation(&user, &load(restricted_local)).is_denied());
}

#[tokio::test]
async fn show_databases_is_filtered() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_roles_to_group("user_group1", ["all_db1"])
        .unwrap()
        .add_roles_to_group("user_group2", ["select_tb1"])
        .unwrap()
        .add_permissions_to_role("all_db1", ["server=server1->db=db1"])
        .unwrap()
        .add_permissions_to_role(
            "select_tb1",
            ["server=server1->db=db1->table=tbl1->action=select"],
        )
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let snapshot = service.snapshot();
    let all = ["default", "db1", "db2"];

    assert!(service
        .authorize_operation(&user2(), &op(OperationKind::ShowDatabases))
        .is_allowed());
    assert_eq!(snapshot.engine.visible_databases(&user1(), all), vec!["db1"]);
    assert_eq!(snapshot.engine.visible_databases(&user2(), all), vec!["db1"]);
    assert_eq!(
        snapshot
            .engine
            .visible_tables(&user2(), "db1", ["tbl1", "tbl2"]),
        vec!["tbl1"]
    );
}

#[tokio::test]
async fn per_database_policy_on_remote_store() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let dfs = InMemoryStorage::new();
    let mut db2_policy = PolicyBuilder::new();
    db2_policy
        .add_roles_to_group("user_group2", ["select_tbl2"])
        .unwrap()
        .add_permissions_to_role(
            "select_tbl2",
            ["server=server1->db=db2->table=tbl2->action=select"],
        )
        .unwrap();
    dfs.insert("hdfs://namenode:8020/policies/db2.ini", db2_policy.document().write());

    let mut policy = PolicyBuilder::new();
    policy
        .add_roles_to_group("user_group1", ["select_tbl1"])
        .unwrap()
        .add_roles_to_group("user_group2", ["select_tbl2"])
        .unwrap()
        .add_permissions_to_role(
            "select_tbl1",
            ["server=server1->db=db1->table=tbl1->action=select"],
        )
        .unwrap()
        .add_database("db2", "hdfs://namenode:8020/policies/db2.ini")
        .unwrap();
    write_policy(&root, &policy).await;

    let registry = StorageRegistry::with_local().with_backend("hdfs", Arc::new(dfs));
    let service = open(&root, registry).await;

    let user = user2();
    assert!(service
        .authorize_operation(&user, &op(OperationKind::Use).with_database("db2"))
        .is_allowed());
    assert!(service
        .authorize_operation(&user, &op(OperationKind::Query).with_input(table("db2", "tbl2")))
        .is_allowed());
    assert!(service
        .authorize_operation(&user, &op(OperationKind::Query).with_input(table("db1", "tbl1")))
        .is_denied());
    assert!(service
        .authorize_operation(&user1(), &op(OperationKind::Query).with_input(table("db1", "tbl1")))
        .is_allowed());
}

#[tokio::test]
async fn join_needs_select_on_both_tables() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("policy.ini");

    let mut policy = PolicyBuilder::new();
    policy
        .add_roles_to_group("user_group1", ["reader"])
        .unwrap()
        .add_permissions_to_role(
            "reader",
            ["server=server1->db=db1->table=a->action=select"],
        )
        .unwrap();
    write_policy(&root, &policy).await;

    let service = open(&root, StorageRegistry::with_local()).await;
    let join = op(OperationKind::Query)
        .with_input(table("db1", "a"))
        .with_input(table("db1", "b"));
    assert!(service.authorize_operation(&user1(), &join).is_denied());

    service
        .edit_root(|builder| {
            builder.add_permissions_to_role("reader", ["server=server1->db=db1->view=b->action=select"])?;
            Ok(())
        })
        .await
        .unwrap();
    assert!(service.authorize_operation(&user1(), &join).is_allowed());
}
