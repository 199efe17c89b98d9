//! Migration planning and application against the scripted driver

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{row, MemoryDriver};
use relic_orm::{
    Adapter, ColumnMetadata, ColumnType, EntityMetadata, MetadataRegistry, MigrationManager,
    OrmError, PostgresAdapter,
};

fn registry_with_users() -> Arc<MetadataRegistry> {
    let registry = Arc::new(MetadataRegistry::new());
    registry.register_entity_metadata(
        EntityMetadata::new("User", "users")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(ColumnMetadata::new("email", ColumnType::String).with_length(320)),
    );
    registry
}

async fn connected(driver: &Arc<MemoryDriver>) -> Arc<dyn Adapter> {
    let adapter: Arc<dyn Adapter> = Arc::new(PostgresAdapter::new(driver.clone()));
    adapter.connect().await.expect("connect");
    adapter
}

#[tokio::test]
async fn missing_table_is_planned_as_create_table() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    // Introspection returns nothing: the table does not exist.
    let plans = manager.plan().await.expect("plan");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].name, "sync_users");
    assert_eq!(
        plans[0].up[0],
        "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, email VARCHAR(320) NOT NULL)"
    );
    assert_eq!(plans[0].down, vec!["DROP TABLE users".to_string()]);
}

#[tokio::test]
async fn apply_runs_ddl_in_a_transaction_and_records_it() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    let plans = manager.plan().await.expect("plan");
    manager.apply(&plans[0]).await.expect("apply");

    let statements = driver.executed_sql();
    let begin = statements.iter().position(|s| s == "BEGIN").expect("BEGIN issued");
    let create = statements
        .iter()
        .position(|s| s.starts_with("CREATE TABLE users"))
        .expect("DDL issued");
    let record = statements
        .iter()
        .position(|s| s.starts_with("INSERT INTO relic_migrations"))
        .expect("tracking row inserted");
    let commit = statements.iter().position(|s| s == "COMMIT").expect("COMMIT issued");

    assert!(begin < create && create < record && record < commit);
}

#[tokio::test]
async fn checksum_drift_on_an_applied_name_fails() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    let plans = manager.plan().await.expect("plan");

    // The tracking table already holds this name with another checksum.
    driver.queue_rows(vec![row(&[
        ("id", json!(1)),
        ("name", json!("sync_users")),
        ("up", json!("CREATE TABLE users (id BIGINT)")),
        ("down", json!("DROP TABLE users")),
        ("timestamp", json!(1700000000)),
        ("checksum", json!("deadbeefdeadbeef")),
        ("applied_at", json!("2026-01-01T00:00:00+00:00")),
    ])]);

    let result = manager.apply(&plans[0]).await;
    assert!(matches!(result, Err(OrmError::Migration(_))));
    // Nothing ran inside a transaction.
    assert!(!driver.executed_sql().iter().any(|s| s == "BEGIN"));
}

#[tokio::test]
async fn reapplying_an_identical_plan_is_a_noop() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    let plans = manager.plan().await.expect("plan");
    let plan = &plans[0];

    driver.queue_rows(vec![row(&[
        ("id", json!(1)),
        ("name", json!(plan.name.clone())),
        ("up", json!(plan.up.join(";\n"))),
        ("down", json!(plan.down.join(";\n"))),
        ("timestamp", json!(plan.timestamp)),
        ("checksum", json!(plan.checksum.clone())),
        ("applied_at", json!("2026-01-01T00:00:00+00:00")),
    ])]);

    manager.apply(plan).await.expect("noop apply");
    assert!(!driver.executed_sql().iter().any(|s| s == "BEGIN"));
}

#[tokio::test]
async fn revert_without_history_is_an_error() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    let result = manager.revert_last().await;
    assert!(matches!(result, Err(OrmError::Migration(_))));
}

#[tokio::test]
async fn revert_runs_down_statements_and_deletes_the_record() {
    let driver = MemoryDriver::new();
    let adapter = connected(&driver).await;
    let manager = MigrationManager::new(registry_with_users(), adapter);

    driver.queue_rows(vec![row(&[
        ("id", json!(4)),
        ("name", json!("sync_users")),
        ("up", json!("CREATE TABLE users (id BIGSERIAL PRIMARY KEY)")),
        ("down", json!("DROP TABLE users")),
        ("timestamp", json!(1700000000)),
        ("checksum", json!("0011223344556677")),
        ("applied_at", json!("2026-01-01T00:00:00+00:00")),
    ])]);

    manager.revert_last().await.expect("revert");

    let statements = driver.executed_sql();
    assert!(statements.iter().any(|s| s == "DROP TABLE users"));
    assert!(statements
        .iter()
        .any(|s| s.starts_with("DELETE FROM relic_migrations WHERE id = ")));
}
