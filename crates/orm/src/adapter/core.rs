//! Shared adapter contract
//!
//! Everything the three dialect adapters have in common: the connected
//! latch, transaction bookkeeping with id validation, savepoint list
//! discipline, placeholder rewriting, and query logging. Dialect adapters
//! delegate here and keep only their dialect tag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::{Driver, QueryResult, SqlDialect, Transaction};
use crate::error::{OrmError, OrmResult};
use crate::logging::QueryLogger;

pub struct AdapterCore {
    driver: Arc<dyn Driver>,
    dialect: SqlDialect,
    connected: AtomicBool,
    current_tx: Mutex<Option<Uuid>>,
    logger: QueryLogger,
}

impl AdapterCore {
    pub fn new(driver: Arc<dyn Driver>, dialect: SqlDialect) -> Self {
        Self {
            driver,
            dialect,
            connected: AtomicBool::new(false),
            current_tx: Mutex::new(None),
            logger: QueryLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: QueryLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub async fn connect(&self) -> OrmResult<()> {
        self.driver.connect().await?;
        self.connected.store(true, Ordering::SeqCst);
        debug!(dialect = ?self.dialect, "adapter connected");
        Ok(())
    }

    pub async fn disconnect(&self) -> OrmResult<()> {
        self.driver.disconnect().await?;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Execute a dialect-neutral statement: rewrite for the dialect, log
    /// with masking, pass driver errors through unchanged.
    pub async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryResult> {
        self.ensure_connected()?;
        let rewritten = self.dialect.rewrite(sql);
        let started = std::time::Instant::now();
        let result = self.driver.execute(&rewritten, params).await;
        self.logger
            .record(&rewritten, params, started.elapsed(), result.is_ok());
        result
    }

    pub async fn begin(&self) -> OrmResult<Transaction> {
        self.ensure_connected()?;
        if self.current_tx.lock().is_some() {
            return Err(OrmError::InvalidTransaction(
                "a transaction is already in progress on this adapter".to_string(),
            ));
        }
        self.driver.execute("BEGIN", &[]).await?;
        let tx = Transaction::new(self.dialect.default_isolation());
        *self.current_tx.lock() = Some(tx.id());
        debug!(tx = %tx.id(), isolation = ?tx.isolation(), "transaction started");
        Ok(tx)
    }

    pub async fn commit(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.check_current(tx)?;
        self.driver.execute("COMMIT", &[]).await?;
        tx.deactivate();
        *self.current_tx.lock() = None;
        debug!(tx = %tx.id(), "transaction committed");
        Ok(())
    }

    pub async fn rollback(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.check_current(tx)?;
        self.driver.execute("ROLLBACK", &[]).await?;
        tx.deactivate();
        *self.current_tx.lock() = None;
        debug!(tx = %tx.id(), "transaction rolled back");
        Ok(())
    }

    pub async fn savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.check_current(tx)?;
        validate_savepoint_name(name)?;
        self.driver
            .execute(&format!("SAVEPOINT {}", name), &[])
            .await?;
        tx.push_savepoint(name);
        Ok(())
    }

    pub async fn rollback_to_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.check_current(tx)?;
        if !tx.has_savepoint(name) {
            return Err(OrmError::SavepointNotFound(name.to_string()));
        }
        self.driver
            .execute(&format!("ROLLBACK TO SAVEPOINT {}", name), &[])
            .await?;
        tx.truncate_savepoints(name)
    }

    pub async fn release_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.check_current(tx)?;
        if !tx.has_savepoint(name) {
            return Err(OrmError::SavepointNotFound(name.to_string()));
        }
        self.driver
            .execute(&format!("RELEASE SAVEPOINT {}", name), &[])
            .await?;
        tx.truncate_savepoints(name)
    }

    fn ensure_connected(&self) -> OrmResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OrmError::Connection(
                "adapter is not connected; call connect() first".to_string(),
            ))
        }
    }

    /// A transaction object is only usable while it is the adapter's
    /// current one; anything else indicates caller state confusion.
    fn check_current(&self, tx: &Transaction) -> OrmResult<()> {
        tx.ensure_active()?;
        match *self.current_tx.lock() {
            Some(current) if current == tx.id() => Ok(()),
            _ => Err(OrmError::InvalidTransaction(format!(
                "transaction {} is not the current transaction",
                tx.id()
            ))),
        }
    }
}

/// Savepoint names reach the statement text directly, so they are limited
/// to identifier characters.
fn validate_savepoint_name(name: &str) -> OrmResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(OrmError::Query(format!(
            "invalid savepoint name '{}'",
            name
        )))
    }
}
