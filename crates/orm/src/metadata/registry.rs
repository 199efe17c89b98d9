//! Metadata Registry - the single source of truth for entity shape
//!
//! An explicitly constructed instance injected into every consumer at
//! startup. Populated during single-threaded bootstrap; read-only for the
//! rest of the process lifetime, which is the whole concurrency contract.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::adapter::Row;
use crate::entity::{Entity, ErasedEntity};
use crate::error::{OrmError, OrmResult};
use crate::manager::hydration::coerce_value;
use crate::metadata::{
    snake_case, ColumnMetadata, EntityMetadata, HookMetadata, IndexMetadata, RelationMetadata,
};

type HydrateFn = Arc<dyn Fn(&EntityMetadata, &Row) -> OrmResult<ErasedEntity> + Send + Sync>;
type RefreshFn = Arc<dyn Fn(&EntityMetadata, &ErasedEntity, &Row) -> OrmResult<()> + Send + Sync>;

/// Type-erased construction table for one entity type, captured at
/// registration so entities can be hydrated when only their registered
/// name is known (relation loading).
#[derive(Clone)]
pub struct EntityRuntime {
    pub type_id: TypeId,
    hydrate: HydrateFn,
    refresh: RefreshFn,
}

impl EntityRuntime {
    pub fn of<E: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            hydrate: Arc::new(|meta, row| {
                let entity = build_from_row::<E>(meta, row)?;
                Ok(Arc::new(RwLock::new(entity)) as ErasedEntity)
            }),
            refresh: Arc::new(|meta, erased, row| {
                let handle = erased.clone().downcast::<RwLock<E>>().map_err(|_| {
                    OrmError::Serialization(format!(
                        "identity map entry does not hold a {}",
                        E::entity_name()
                    ))
                })?;
                let entity = build_from_row::<E>(meta, row)?;
                *handle.write() = entity;
                Ok(())
            }),
        }
    }

    /// Construct a fresh erased handle from a raw row
    pub fn hydrate(&self, meta: &EntityMetadata, row: &Row) -> OrmResult<ErasedEntity> {
        (self.hydrate)(meta, row)
    }

    /// Overwrite the contents of an existing erased handle from a raw row
    pub fn refresh(&self, meta: &EntityMetadata, erased: &ErasedEntity, row: &Row) -> OrmResult<()> {
        (self.refresh)(meta, erased, row)
    }
}

fn build_from_row<E: Entity>(meta: &EntityMetadata, row: &Row) -> OrmResult<E> {
    let mut entity = E::default();
    for column in &meta.columns {
        if let Some(raw) = row.get(&column.column_name) {
            let value = coerce_value(column, raw.clone())?;
            entity.set_column(&column.name, value)?;
        }
    }
    Ok(entity)
}

/// Catalog of entity, column, relation, hook, and index definitions keyed
/// by logical entity name.
#[derive(Default)]
pub struct MetadataRegistry {
    entities: DashMap<String, EntityMetadata>,
    runtimes: DashMap<String, EntityRuntime>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type: its declared metadata plus the erased
    /// construction table used for runtime-by-name hydration.
    pub fn register<E: Entity>(&self) {
        self.register_entity_metadata(E::metadata());
        self.runtimes
            .insert(E::entity_name().to_string(), EntityRuntime::of::<E>());
    }

    /// Merge entity metadata into the catalog. Idempotent for properties
    /// already present: a repeat registration of the entity marker does not
    /// wipe columns, relations, hooks, or indexes registered earlier, which
    /// supports declaration orders where properties land before the entity
    /// itself.
    pub fn register_entity_metadata(&self, incoming: EntityMetadata) {
        let mut entry = self
            .entities
            .entry(incoming.name.clone())
            .or_insert_with(|| EntityMetadata::new(incoming.name.clone(), incoming.table.clone()));
        entry.table = incoming.table;
        for column in incoming.columns {
            upsert_column(&mut entry, column);
        }
        for relation in incoming.relations {
            upsert_relation(&mut entry, relation);
        }
        for hook in incoming.hooks {
            upsert_hook(&mut entry, hook);
        }
        for index in incoming.indexes {
            upsert_index(&mut entry, index);
        }
    }

    /// Insert or overwrite a single column. The entity does not need to be
    /// registered first; a shell entry is created on demand.
    pub fn register_column(&self, entity: &str, column: ColumnMetadata) {
        let mut entry = self.shell(entity);
        upsert_column(&mut entry, column);
    }

    pub fn register_relation(&self, entity: &str, relation: RelationMetadata) {
        let mut entry = self.shell(entity);
        upsert_relation(&mut entry, relation);
    }

    pub fn register_hook(&self, entity: &str, hook: HookMetadata) {
        let mut entry = self.shell(entity);
        upsert_hook(&mut entry, hook);
    }

    pub fn register_index(&self, entity: &str, index: IndexMetadata) {
        let mut entry = self.shell(entity);
        upsert_index(&mut entry, index);
    }

    fn shell(&self, entity: &str) -> dashmap::mapref::one::RefMut<'_, String, EntityMetadata> {
        self.entities
            .entry(entity.to_string())
            .or_insert_with(|| EntityMetadata::new(entity, snake_case(entity)))
    }

    /// Fetch the metadata for an entity name
    pub fn get(&self, entity: &str) -> OrmResult<EntityMetadata> {
        self.entities
            .get(entity)
            .map(|m| m.clone())
            .ok_or_else(|| OrmError::EntityNotRegistered(entity.to_string()))
    }

    /// First primary column of the entity; absence is a hard precondition
    /// failure for any id-based operation.
    pub fn primary_key(&self, entity: &str) -> OrmResult<ColumnMetadata> {
        let meta = self.get(entity)?;
        meta.require_primary_key().cloned()
    }

    /// Resolve an entity by its physical table name. Linear scan: the
    /// catalog holds application entities, populated once at startup.
    pub fn entity_by_table(&self, table: &str) -> Option<EntityMetadata> {
        self.entities
            .iter()
            .find(|e| e.table == table)
            .map(|e| e.clone())
    }

    pub fn runtime(&self, entity: &str) -> OrmResult<EntityRuntime> {
        self.runtimes
            .get(entity)
            .map(|r| r.clone())
            .ok_or_else(|| OrmError::EntityNotRegistered(entity.to_string()))
    }

    /// All registered entity metadata, for the migration planner
    pub fn all(&self) -> Vec<EntityMetadata> {
        let mut entities: Vec<_> = self.entities.iter().map(|e| e.clone()).collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Wipe the catalog. Test harness use only; never call this from a
    /// request-serving path.
    pub fn clear(&self) {
        self.entities.clear();
        self.runtimes.clear();
    }
}

fn upsert_column(meta: &mut EntityMetadata, column: ColumnMetadata) {
    if let Some(existing) = meta.columns.iter_mut().find(|c| c.name == column.name) {
        *existing = column;
    } else {
        meta.columns.push(column);
    }
}

fn upsert_relation(meta: &mut EntityMetadata, relation: RelationMetadata) {
    if let Some(existing) = meta.relations.iter_mut().find(|r| r.name == relation.name) {
        *existing = relation;
    } else {
        meta.relations.push(relation);
    }
}

fn upsert_hook(meta: &mut EntityMetadata, hook: HookMetadata) {
    if let Some(existing) = meta
        .hooks
        .iter_mut()
        .find(|h| h.stage == hook.stage && h.method == hook.method)
    {
        *existing = hook;
    } else {
        meta.hooks.push(hook);
    }
}

fn upsert_index(meta: &mut EntityMetadata, index: IndexMetadata) {
    if let Some(existing) = meta.indexes.iter_mut().find(|i| i.name == index.name) {
        *existing = index;
    } else {
        meta.indexes.push(index);
    }
}
