//! Error types for the ORM layer
//!
//! Covers registration failures, state preconditions, transaction misuse,
//! and pass-through database errors.

use std::fmt;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error type for all ORM operations
#[derive(Debug, Clone)]
pub enum OrmError {
    /// Raw database or driver error, propagated unchanged
    Database(String),
    /// Connection-level failure (connect, disconnect, not connected)
    Connection(String),
    /// Query building or execution error
    Query(String),
    /// Entity type was never registered with the metadata registry
    EntityNotRegistered(String),
    /// Entity has no column flagged as primary
    NoPrimaryKey(String),
    /// Operation requires a primary-key value but the instance has none
    MissingPrimaryKey,
    /// Transaction object does not match the current transaction
    InvalidTransaction(String),
    /// Referenced savepoint is not present in the transaction
    SavepointNotFound(String),
    /// Relationship resolution failed
    Relationship(String),
    /// Migration planning or execution error
    Migration(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Lifecycle hook failed
    Hook(String),
    /// Record not found
    NotFound(String),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::Database(msg) => write!(f, "Database error: {}", msg),
            OrmError::Connection(msg) => write!(f, "Connection error: {}", msg),
            OrmError::Query(msg) => write!(f, "Query error: {}", msg),
            OrmError::EntityNotRegistered(name) => {
                write!(f, "Entity '{}' is not registered", name)
            }
            OrmError::NoPrimaryKey(name) => {
                write!(f, "Entity '{}' has no primary key column", name)
            }
            OrmError::MissingPrimaryKey => {
                write!(f, "Primary key value is missing on the instance")
            }
            OrmError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            OrmError::SavepointNotFound(name) => write!(f, "Savepoint '{}' not found", name),
            OrmError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            OrmError::Migration(msg) => write!(f, "Migration error: {}", msg),
            OrmError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OrmError::Hook(msg) => write!(f, "Hook error: {}", msg),
            OrmError::NotFound(what) => write!(f, "Record not found: {}", what),
        }
    }
}

impl std::error::Error for OrmError {}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for OrmError {
    fn from(err: anyhow::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}

impl OrmError {
    /// True for errors that indicate a caller programming mistake rather
    /// than a transient condition. These are raised before any I/O and
    /// must never be retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            OrmError::EntityNotRegistered(_)
                | OrmError::NoPrimaryKey(_)
                | OrmError::MissingPrimaryKey
                | OrmError::InvalidTransaction(_)
                | OrmError::SavepointNotFound(_)
        )
    }
}
