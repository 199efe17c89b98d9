//! Adapter layer - the fixed interface between the ORM and one physical
//! database
//!
//! The wire protocol itself lives behind the [`Driver`] trait and is an
//! external collaborator; adapters own dialect differences, transaction
//! bookkeeping, and placeholder re-indexing on top of it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrmResult;

pub mod core;
pub mod dialect;
pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod transaction;

pub use self::core::AdapterCore;
pub use dialect::{PlaceholderStyle, SqlDialect};
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;
pub use transaction::{IsolationLevel, Transaction};

/// One result row, keyed by physical column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.cells.insert(column.into(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Result-set column description
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Outcome of one statement execution
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub fields: Vec<Field>,
    /// Generated key surfaced by drivers whose dialect cannot execute
    /// RETURNING
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self {
            rows,
            row_count,
            fields: Vec::new(),
            last_insert_id: None,
        }
    }
}

/// Opaque network driver for one physical database. Concrete wire
/// implementations are supplied by the embedding application.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self) -> OrmResult<()>;

    async fn disconnect(&self) -> OrmResult<()>;

    /// Execute one statement. `sql` is already rewritten into the driver's
    /// placeholder style; `params` are positional and 0-indexed.
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryResult>;
}

/// The adapter contract consumed by the entity manager and the migration
/// manager. One implementation exists per supported dialect.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Establish connectivity. Must succeed before `query` is callable.
    async fn connect(&self) -> OrmResult<()>;

    async fn disconnect(&self) -> OrmResult<()>;

    /// Execute a parameterized statement written in the dialect-neutral
    /// `$n` form
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryResult>;

    /// Open a transaction reporting the dialect's default isolation level
    async fn begin(&self) -> OrmResult<Transaction>;

    async fn commit(&self, tx: &mut Transaction) -> OrmResult<()>;

    async fn rollback(&self, tx: &mut Transaction) -> OrmResult<()>;

    async fn savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()>;

    async fn rollback_to_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()>;

    async fn release_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()>;

    fn dialect(&self) -> SqlDialect;
}
