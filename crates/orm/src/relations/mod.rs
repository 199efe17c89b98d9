//! Relation Manager - batch loading of associations
//!
//! Resolves relations for a homogeneous collection of already-loaded
//! entities with one membership query per relation (two for many-to-many:
//! join rows, then targets), instead of one query per row.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::entity::{Entity, EntityHandle, ErasedEntity, RelationValue};
use crate::error::{OrmError, OrmResult};
use crate::manager::hydration::coerce_value;
use crate::manager::EntityManager;
use crate::metadata::registry::EntityRuntime;
use crate::metadata::{snake_case, EntityMetadata, RelationKind, RelationMetadata};
use crate::query::Condition;

/// Chunking configuration for batched loads; bounds the width of the
/// membership list sent per round-trip.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
        }
    }
}

/// Batch resolver for entity relations
pub struct RelationManager<'a> {
    em: &'a EntityManager,
    config: BatchConfig,
}

impl<'a> RelationManager<'a> {
    pub fn new(em: &'a EntityManager) -> Self {
        Self {
            em,
            config: BatchConfig::default(),
        }
    }

    pub fn with_config(em: &'a EntityManager, config: BatchConfig) -> Self {
        Self { em, config }
    }

    /// Resolve the named relations for every parent in one pass
    pub async fn load<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        relations: &[String],
    ) -> OrmResult<()> {
        if parents.is_empty() {
            return Ok(());
        }
        for relation in relations {
            self.load_one::<E>(parents, relation).await?;
        }
        Ok(())
    }

    /// Resolve relations chunk-by-chunk, bounding membership-list width
    pub async fn load_batched<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        relations: &[String],
    ) -> OrmResult<()> {
        for chunk in parents.chunks(self.config.max_batch_size.max(1)) {
            self.load::<E>(chunk, relations).await?;
        }
        Ok(())
    }

    async fn load_one<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        relation: &str,
    ) -> OrmResult<()> {
        let registry = self.em.registry();
        let meta = registry.get(E::entity_name())?;
        let rel = meta
            .relation(relation)
            .ok_or_else(|| {
                OrmError::Relationship(format!(
                    "relation '{}' is not defined on '{}'",
                    relation, meta.name
                ))
            })?
            .clone();
        let target_meta = registry.get(&rel.target)?;
        let target_runtime = registry.runtime(&rel.target)?;

        match rel.kind {
            RelationKind::ManyToOne => {
                self.load_many_to_one(parents, &meta, &rel, &target_meta, &target_runtime)
                    .await
            }
            RelationKind::OneToOne | RelationKind::OneToMany => {
                self.load_from_target_key(parents, &meta, &rel, &target_meta, &target_runtime)
                    .await
            }
            RelationKind::ManyToMany => {
                self.load_many_to_many(parents, &meta, &rel, &target_meta, &target_runtime)
                    .await
            }
        }
    }

    /// Foreign key on the parent points at the target's primary key
    async fn load_many_to_one<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        meta: &EntityMetadata,
        rel: &RelationMetadata,
        target_meta: &EntityMetadata,
        target_runtime: &EntityRuntime,
    ) -> OrmResult<()> {
        let fk_column = rel.join_column_or_convention(&rel.target);
        let fk_logical = meta
            .column(&fk_column)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| fk_column.clone());
        let target_pk = target_meta.require_primary_key()?.clone();

        let mut keys = Vec::new();
        for parent in parents {
            let value = parent.read().column_value(&fk_logical);
            if let Some(value) = value {
                if !value.is_null() && !keys.contains(&value) {
                    keys.push(value);
                }
            }
        }

        let mut by_key: HashMap<String, ErasedEntity> = HashMap::new();
        if !keys.is_empty() {
            let rows = self
                .em
                .fetch_rows(
                    &target_meta.table,
                    Condition::is_in(target_pk.column_name.clone(), keys),
                )
                .await?;
            for row in &rows {
                let entity = self.em.hydrate_erased(target_meta, target_runtime, row)?;
                if let Some(raw) = row.get(&target_pk.column_name) {
                    let key = coerce_value(&target_pk, raw.clone())?;
                    by_key.insert(value_key(&key), entity);
                }
            }
        }

        debug!(
            relation = %rel.name,
            parents = parents.len(),
            matched = by_key.len(),
            "resolved many-to-one relation"
        );

        for parent in parents {
            let fk_value = parent.read().column_value(&fk_logical);
            // A missing related row is a valid terminal state, not an error.
            let related = fk_value
                .filter(|v| !v.is_null())
                .and_then(|v| by_key.get(&value_key(&v)).cloned());
            parent
                .write()
                .set_relation(&rel.name, RelationValue::One(related))?;
        }
        Ok(())
    }

    /// Foreign key on the target points back at the parents' primary keys;
    /// covers both one-to-one and one-to-many.
    async fn load_from_target_key<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        meta: &EntityMetadata,
        rel: &RelationMetadata,
        target_meta: &EntityMetadata,
        target_runtime: &EntityRuntime,
    ) -> OrmResult<()> {
        let parent_pk = meta.require_primary_key()?.clone();
        let fk_column = rel.join_column_or_convention(&meta.name);
        let fk_meta = target_meta.column(&fk_column).cloned();

        let mut parent_keys = Vec::new();
        for parent in parents {
            let value = parent.read().column_value(&parent_pk.name);
            if let Some(value) = value {
                if !value.is_null() && !parent_keys.contains(&value) {
                    parent_keys.push(value);
                }
            }
        }

        let mut grouped: HashMap<String, Vec<ErasedEntity>> = HashMap::new();
        if !parent_keys.is_empty() {
            let rows = self
                .em
                .fetch_rows(
                    &target_meta.table,
                    Condition::is_in(fk_column.clone(), parent_keys),
                )
                .await?;
            for row in &rows {
                let entity = self.em.hydrate_erased(target_meta, target_runtime, row)?;
                if let Some(raw) = row.get(&fk_column) {
                    let key = match &fk_meta {
                        Some(column) => coerce_value(column, raw.clone())?,
                        None => raw.clone(),
                    };
                    grouped.entry(value_key(&key)).or_default().push(entity);
                }
            }
        }

        debug!(
            relation = %rel.name,
            parents = parents.len(),
            matched = grouped.values().map(|v| v.len()).sum::<usize>(),
            "resolved relation from target foreign key"
        );

        let collection = rel.kind.is_collection();
        for parent in parents {
            let pk_value = parent.read().column_value(&parent_pk.name);
            let matches = pk_value
                .filter(|v| !v.is_null())
                .and_then(|v| grouped.get(&value_key(&v)).cloned())
                .unwrap_or_default();
            let value = if collection {
                // Every parent receives a list, possibly empty.
                RelationValue::Many(matches)
            } else {
                RelationValue::One(matches.into_iter().next())
            };
            parent.write().set_relation(&rel.name, value)?;
        }
        Ok(())
    }

    /// Join-table resolution: join rows by owning key, targets by the
    /// collected target ids, grouped back through the pairs.
    async fn load_many_to_many<E: Entity>(
        &self,
        parents: &[EntityHandle<E>],
        meta: &EntityMetadata,
        rel: &RelationMetadata,
        target_meta: &EntityMetadata,
        target_runtime: &EntityRuntime,
    ) -> OrmResult<()> {
        let parent_pk = meta.require_primary_key()?.clone();
        let target_pk = target_meta.require_primary_key()?.clone();
        let join_table = rel
            .join_table
            .clone()
            .unwrap_or_else(|| format!("{}_{}", meta.table, target_meta.table));
        let owning_column = rel.join_column_or_convention(&meta.name);
        let inverse_column = rel
            .inverse_join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", snake_case(&rel.target)));

        let mut parent_keys = Vec::new();
        for parent in parents {
            let value = parent.read().column_value(&parent_pk.name);
            if let Some(value) = value {
                if !value.is_null() && !parent_keys.contains(&value) {
                    parent_keys.push(value);
                }
            }
        }

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut target_ids: Vec<Value> = Vec::new();
        if !parent_keys.is_empty() {
            let join_rows = self
                .em
                .fetch_rows(
                    &join_table,
                    Condition::is_in(owning_column.clone(), parent_keys),
                )
                .await?;
            for row in &join_rows {
                let owner = row.get(&owning_column);
                let target = row.get(&inverse_column);
                if let (Some(owner), Some(target)) = (owner, target) {
                    if owner.is_null() || target.is_null() {
                        continue;
                    }
                    let target = coerce_value(&target_pk, target.clone())?;
                    pairs.push((value_key(owner), value_key(&target)));
                    if !target_ids.contains(&target) {
                        target_ids.push(target);
                    }
                }
            }
        }

        let mut targets_by_key: HashMap<String, ErasedEntity> = HashMap::new();
        if !target_ids.is_empty() {
            let rows = self
                .em
                .fetch_rows(
                    &target_meta.table,
                    Condition::is_in(target_pk.column_name.clone(), target_ids),
                )
                .await?;
            for row in &rows {
                let entity = self.em.hydrate_erased(target_meta, target_runtime, row)?;
                if let Some(raw) = row.get(&target_pk.column_name) {
                    let key = coerce_value(&target_pk, raw.clone())?;
                    targets_by_key.insert(value_key(&key), entity);
                }
            }
        }

        let mut grouped: HashMap<String, Vec<ErasedEntity>> = HashMap::new();
        for (owner_key, target_key) in &pairs {
            if let Some(target) = targets_by_key.get(target_key) {
                grouped
                    .entry(owner_key.clone())
                    .or_default()
                    .push(target.clone());
            }
        }

        debug!(
            relation = %rel.name,
            join_table = %join_table,
            parents = parents.len(),
            links = pairs.len(),
            "resolved many-to-many relation"
        );

        for parent in parents {
            let pk_value = parent.read().column_value(&parent_pk.name);
            let matches = pk_value
                .filter(|v| !v.is_null())
                .and_then(|v| grouped.get(&value_key(&v)).cloned())
                .unwrap_or_default();
            parent
                .write()
                .set_relation(&rel.name, RelationValue::Many(matches))?;
        }
        Ok(())
    }
}

/// Grouping-map key for a scalar value; strings keep their text form so
/// they match identity-key derivation.
fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
