//! # relic-orm: entity mapping over pluggable SQL backends
//!
//! A metadata-driven mapping layer: entity shape lives in an explicitly
//! constructed registry, queries compile through a fluent builder into
//! parameterized SQL, and an entity manager provides unit-of-work
//! semantics (identity map, hydration, lifecycle hooks, transactions with
//! savepoints) over an adapter per SQL dialect. Relations batch-load to
//! avoid per-row queries; the migration manager diffs declared metadata
//! against the live schema.
//!
//! Wire drivers are not part of this crate: adapters delegate raw
//! execution to the [`adapter::Driver`] trait supplied by the embedding
//! application.

pub mod adapter;
pub mod analyzer;
pub mod backoff;
pub mod entity;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metadata;
pub mod migrations;
pub mod query;
pub mod relations;
pub mod repository;
pub mod validation;

// Re-export the working surface.
pub use adapter::{
    Adapter, AdapterCore, Driver, Field, IsolationLevel, MySqlAdapter, PlaceholderStyle,
    PostgresAdapter, QueryResult, Row, SqlDialect, SqliteAdapter, Transaction,
};
pub use analyzer::QueryAnalyzer;
pub use backoff::Backoff;
pub use entity::{downcast_handle, Entity, EntityHandle, ErasedEntity, RelationValue};
pub use error::{OrmError, OrmResult};
pub use logging::QueryLogger;
pub use manager::{EntityManager, QueryOptions};
pub use metadata::{
    ColumnMetadata, ColumnType, EntityMetadata, HookMetadata, HookStage, IndexMetadata,
    MetadataRegistry, RelationKind, RelationMetadata,
};
pub use migrations::{MigrationManager, MigrationRecord, PlannedMigration};
pub use query::{
    BuiltQuery, CompareOp, Condition, JoinClause, JoinType, OrderDirection, QueryBuilder,
    QueryKind, SetClause,
};
pub use relations::{BatchConfig, RelationManager};
pub use repository::Repository;
pub use validation::{validate_entity, ValidationError};
