//! Transaction lifecycle and savepoint discipline

mod common;

use std::sync::Arc;

use common::{fixture_registry, MemoryDriver};
use relic_orm::{
    Adapter, EntityManager, IsolationLevel, MySqlAdapter, OrmError, PostgresAdapter,
};

async fn adapter(driver: &Arc<MemoryDriver>) -> Arc<dyn Adapter> {
    let adapter: Arc<dyn Adapter> = Arc::new(PostgresAdapter::new(driver.clone()));
    adapter.connect().await.expect("connect");
    adapter
}

#[tokio::test]
async fn begin_commit_round_trip() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;

    let mut tx = adapter.begin().await.expect("begin");
    assert!(tx.is_active());
    assert_eq!(tx.isolation(), IsolationLevel::ReadCommitted);

    adapter.commit(&mut tx).await.expect("commit");
    assert!(!tx.is_active());
    assert_eq!(driver.executed_sql(), vec!["BEGIN", "COMMIT"]);

    // The adapter is free for a new transaction afterwards.
    let mut next = adapter.begin().await.expect("second begin");
    adapter.rollback(&mut next).await.expect("rollback");
}

#[tokio::test]
async fn mysql_reports_its_default_isolation() {
    let driver = MemoryDriver::new();
    let adapter: Arc<dyn Adapter> = Arc::new(MySqlAdapter::new(driver.clone()));
    adapter.connect().await.unwrap();

    let tx = adapter.begin().await.expect("begin");
    assert_eq!(tx.isolation(), IsolationLevel::RepeatableRead);
}

#[tokio::test]
async fn concurrent_begin_on_one_adapter_is_rejected() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;

    let _tx = adapter.begin().await.expect("begin");
    let second = adapter.begin().await;
    assert!(matches!(second, Err(OrmError::InvalidTransaction(_))));
}

#[tokio::test]
async fn stale_transaction_objects_are_rejected() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;

    let mut tx = adapter.begin().await.expect("begin");
    adapter.rollback(&mut tx).await.expect("rollback");

    // Committing the finished transaction object again must fail.
    let result = adapter.commit(&mut tx).await;
    assert!(matches!(result, Err(OrmError::InvalidTransaction(_))));
}

#[tokio::test]
async fn savepoint_stack_discipline() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;

    let mut tx = adapter.begin().await.expect("begin");
    adapter.savepoint(&mut tx, "a").await.expect("savepoint a");
    adapter.savepoint(&mut tx, "b").await.expect("savepoint b");
    adapter.savepoint(&mut tx, "c").await.expect("savepoint c");
    assert_eq!(tx.savepoints(), &["a", "b", "c"]);

    // Rolling back to b discards b and everything after it.
    adapter
        .rollback_to_savepoint(&mut tx, "b")
        .await
        .expect("rollback to b");
    assert_eq!(tx.savepoints(), &["a".to_string()]);

    // b is gone; releasing it now is an error, not a no-op.
    let result = adapter.release_savepoint(&mut tx, "b").await;
    assert!(matches!(result, Err(OrmError::SavepointNotFound(_))));

    let statements = driver.executed_sql();
    assert!(statements.contains(&"SAVEPOINT b".to_string()));
    assert!(statements.contains(&"ROLLBACK TO SAVEPOINT b".to_string()));
    // The failed release never reached the driver.
    assert!(!statements.contains(&"RELEASE SAVEPOINT b".to_string()));
}

#[tokio::test]
async fn savepoint_names_are_validated() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;

    let mut tx = adapter.begin().await.expect("begin");
    let result = adapter.savepoint(&mut tx, "bad name; DROP TABLE users").await;
    assert!(matches!(result, Err(OrmError::Query(_))));
    assert!(tx.savepoints().is_empty());
}

#[tokio::test]
async fn entity_manager_allows_one_current_transaction() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;
    let em = EntityManager::new(fixture_registry(), adapter);

    let mut tx = em.begin().await.expect("begin");
    let second = em.begin().await;
    assert!(matches!(second, Err(OrmError::InvalidTransaction(_))));

    em.commit(&mut tx).await.expect("commit");
    // After commit a new transaction may start.
    let mut next = em.begin().await.expect("begin again");
    em.rollback(&mut next).await.expect("rollback");
}

#[tokio::test]
async fn entity_manager_savepoints_pass_through() {
    let driver = MemoryDriver::new();
    let adapter = adapter(&driver).await;
    let em = EntityManager::new(fixture_registry(), adapter);

    let mut tx = em.begin().await.expect("begin");
    em.savepoint(&mut tx, "stage_one").await.expect("savepoint");
    em.rollback_to_savepoint(&mut tx, "stage_one")
        .await
        .expect("rollback to savepoint");
    assert!(tx.savepoints().is_empty());
    em.rollback(&mut tx).await.expect("rollback");
}
