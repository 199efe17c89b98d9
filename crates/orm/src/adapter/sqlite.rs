//! SQLite adapter
//!
//! Positional `?` placeholders, textual date storage, and RETURNING for
//! generated keys. Introspection goes through PRAGMA instead of
//! information_schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{
    Adapter, AdapterCore, Driver, QueryResult, SqlDialect, Transaction,
};
use crate::error::OrmResult;
use crate::logging::QueryLogger;

pub struct SqliteAdapter {
    core: AdapterCore,
}

impl SqliteAdapter {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            core: AdapterCore::new(driver, SqlDialect::Sqlite),
        }
    }

    pub fn with_logger(driver: Arc<dyn Driver>, logger: QueryLogger) -> Self {
        Self {
            core: AdapterCore::new(driver, SqlDialect::Sqlite).with_logger(logger),
        }
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn connect(&self) -> OrmResult<()> {
        self.core.connect().await
    }

    async fn disconnect(&self) -> OrmResult<()> {
        self.core.disconnect().await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryResult> {
        self.core.query(sql, params).await
    }

    async fn begin(&self) -> OrmResult<Transaction> {
        self.core.begin().await
    }

    async fn commit(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.core.commit(tx).await
    }

    async fn rollback(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.core.rollback(tx).await
    }

    async fn savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.core.savepoint(tx, name).await
    }

    async fn rollback_to_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.core.rollback_to_savepoint(tx, name).await
    }

    async fn release_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.core.release_savepoint(tx, name).await
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }
}
