//! Transactions and savepoints
//!
//! A [`Transaction`] is a passive record of transaction state: identifier,
//! isolation level, and the ordered savepoint list. Adapters mutate it as
//! they issue the corresponding statements. Savepoints are strictly
//! nested; the list only ever shrinks from the tail.

use std::time::Instant;

use uuid::Uuid;

use crate::error::{OrmError, OrmResult};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL fragment for SET TRANSACTION ISOLATION LEVEL
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// State of one open transaction
#[derive(Debug, Clone)]
pub struct Transaction {
    id: Uuid,
    isolation: IsolationLevel,
    savepoints: Vec<String>,
    active: bool,
    began_at: Instant,
}

impl Transaction {
    pub fn new(isolation: IsolationLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            isolation,
            savepoints: Vec::new(),
            active: true,
            began_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// When this transaction was opened. There is no automatic rollback on
    /// caller inactivity; callers wanting an abandon policy build it on
    /// this timestamp.
    pub fn began_at(&self) -> Instant {
        self.began_at
    }

    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    pub fn has_savepoint(&self, name: &str) -> bool {
        self.savepoints.iter().any(|s| s == name)
    }

    pub(crate) fn ensure_active(&self) -> OrmResult<()> {
        if self.active {
            Ok(())
        } else {
            Err(OrmError::InvalidTransaction(
                "transaction is no longer active".to_string(),
            ))
        }
    }

    /// Record a savepoint. Re-declaring an existing name moves it to the
    /// tail, matching SAVEPOINT semantics.
    pub(crate) fn push_savepoint(&mut self, name: &str) {
        self.savepoints.retain(|s| s != name);
        self.savepoints.push(name.to_string());
    }

    /// Drop `name` and everything created after it. Used by both rollback
    /// and release; referencing an unknown name is an error, not a no-op.
    pub(crate) fn truncate_savepoints(&mut self, name: &str) -> OrmResult<()> {
        match self.savepoints.iter().position(|s| s == name) {
            Some(index) => {
                self.savepoints.truncate(index);
                Ok(())
            }
            None => Err(OrmError::SavepointNotFound(name.to_string())),
        }
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.savepoints.clear();
    }
}
