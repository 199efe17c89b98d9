//! Entity contract - the typed binding between table rows and Rust structs
//!
//! Hydration maps column names to struct fields through [`Entity::set_column`]
//! with exhaustive matching on the logical column type, replacing any runtime
//! property inspection. Lifecycle hooks are entity methods dispatched by name
//! through [`Entity::call_hook`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::OrmResult;
use crate::metadata::EntityMetadata;

/// Shared, interior-mutable handle to a managed entity instance.
///
/// The identity map hands out clones of one handle per (type, primary key)
/// pair, so every fetch of the same row observes the same instance.
pub type EntityHandle<E> = Arc<RwLock<E>>;

/// Type-erased entity handle, used where the concrete type is only known
/// by its registered name (relation loading, identity map storage).
pub type ErasedEntity = Arc<dyn Any + Send + Sync>;

/// Value assigned to a relation property after batch loading
#[derive(Clone)]
pub enum RelationValue {
    /// To-one relations; `None` is a valid terminal state, not an error
    One(Option<ErasedEntity>),
    /// To-many relations; always assigned, possibly empty
    Many(Vec<ErasedEntity>),
}

/// Recover a typed handle from an erased one. Returns `None` when the
/// erased value holds a different entity type.
pub fn downcast_handle<E: Entity>(erased: &ErasedEntity) -> Option<EntityHandle<E>> {
    erased.clone().downcast::<RwLock<E>>().ok()
}

/// Contract every managed entity type implements.
///
/// `column_value` returning `None` means the field is absent from the
/// instance and is skipped by INSERT/UPDATE collection; `Value::Null` is an
/// explicit null.
#[async_trait]
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Logical entity name, the registry key
    fn entity_name() -> &'static str;

    /// Declared shape of this entity, registered once at bootstrap
    fn metadata() -> EntityMetadata;

    /// Snapshot one field by its logical column name
    fn column_value(&self, column: &str) -> Option<Value>;

    /// Assign one field from a coerced row value
    fn set_column(&mut self, column: &str, value: Value) -> OrmResult<()>;

    /// Assign a batch-loaded relation. Entities without relations keep the
    /// default no-op.
    fn set_relation(&mut self, relation: &str, value: RelationValue) -> OrmResult<()> {
        let _ = (relation, value);
        Ok(())
    }

    /// Invoke a lifecycle hook method by its registered name. Hook bodies
    /// may await (password hashing and similar side effects).
    async fn call_hook(&mut self, method: &str) -> OrmResult<()> {
        let _ = method;
        Ok(())
    }
}
