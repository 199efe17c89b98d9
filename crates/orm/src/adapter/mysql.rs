//! MySQL adapter
//!
//! Placeholders are re-indexed to `?` at execution time, OFFSET gains an
//! explicit LIMIT, and generated keys surface through the driver's
//! `last_insert_id` since RETURNING is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{
    Adapter, AdapterCore, Driver, QueryResult, SqlDialect, Transaction,
};
use crate::error::OrmResult;
use crate::logging::QueryLogger;

pub struct MySqlAdapter {
    core: AdapterCore,
}

impl MySqlAdapter {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            core: AdapterCore::new(driver, SqlDialect::MySql),
        }
    }

    pub fn with_logger(driver: Arc<dyn Driver>, logger: QueryLogger) -> Self {
        Self {
            core: AdapterCore::new(driver, SqlDialect::MySql).with_logger(logger),
        }
    }
}

#[async_trait]
impl Adapter for MySqlAdapter {
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
        SqlDialect::MySql
    }
}
