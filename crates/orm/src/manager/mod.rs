//! Entity Manager - the unit of work
//!
//! Translates entity-level operations into builder + adapter calls,
//! maintains the identity map, and runs lifecycle hooks. Precondition
//! failures (unregistered type, missing primary key) are raised before any
//! adapter call and are never retried.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::{Adapter, QueryResult, Row, Transaction};
use crate::analyzer::QueryAnalyzer;
use crate::entity::{downcast_handle, Entity, EntityHandle, ErasedEntity};
use crate::error::{OrmError, OrmResult};
use crate::metadata::registry::EntityRuntime;
use crate::metadata::{EntityMetadata, HookStage, MetadataRegistry};
use crate::query::{BuiltQuery, Condition, OrderDirection, QueryBuilder};
use crate::relations::RelationManager;

pub mod hydration;
pub mod identity;

use hydration::coerce_value;
use identity::{identity_key, IdentityMap};

/// Logical query options accepted by find operations
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Condition tree in the logical grammar
    pub filter: Option<Value>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub select: Vec<String>,
    /// Relation names to batch-load onto the results
    pub relations: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn select(mut self, columns: Vec<String>) -> Self {
        self.select = columns;
        self
    }

    pub fn with_relations(mut self, relations: Vec<String>) -> Self {
        self.relations = relations;
        self
    }
}

/// Orchestrates find/save/remove for registered entity types
pub struct EntityManager {
    registry: Arc<MetadataRegistry>,
    adapter: Arc<dyn Adapter>,
    identity: IdentityMap,
    analyzer: Arc<QueryAnalyzer>,
    current_tx: Mutex<Option<Uuid>>,
}

impl EntityManager {
    pub fn new(registry: Arc<MetadataRegistry>, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            registry,
            adapter,
            identity: IdentityMap::new(),
            analyzer: Arc::new(QueryAnalyzer::new()),
            current_tx: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn analyzer(&self) -> &Arc<QueryAnalyzer> {
        &self.analyzer
    }

    /// Number of live identity-map entries
    pub fn identity_len(&self) -> usize {
        self.identity.len()
    }

    /// Drop every identity-map entry. Held handles stay alive but are no
    /// longer shared with future fetches.
    pub fn clear_identity_map(&self) {
        self.identity.clear();
    }

    /// Fetch entities matching the options
    pub async fn find<E: Entity>(&self, options: QueryOptions) -> OrmResult<Vec<EntityHandle<E>>> {
        let meta = self.registry.get(E::entity_name())?;

        let mut qb = QueryBuilder::new(meta.table.as_str());
        if !options.select.is_empty() {
            let columns = options
                .select
                .iter()
                .map(|name| {
                    meta.column(name)
                        .map(|c| c.column_name.clone())
                        .unwrap_or_else(|| name.clone())
                })
                .collect();
            qb = qb.select(columns);
        }
        if let Some(filter) = &options.filter {
            for clause in Condition::parse_list(filter)? {
                qb = qb.where_cond(clause);
            }
        }
        for (column, direction) in &options.order_by {
            qb = qb.order_by(column.clone(), *direction);
        }
        if let Some(limit) = options.limit {
            qb = qb.limit(limit);
        }
        if let Some(offset) = options.offset {
            qb = qb.offset(offset);
        }

        let built = qb.build();
        let result = self.run_query(&built).await?;

        let mut handles = Vec::with_capacity(result.rows.len());
        for row in &result.rows {
            handles.push(self.hydrate::<E>(&meta, row)?);
        }

        if !options.relations.is_empty() {
            RelationManager::new(self)
                .load::<E>(&handles, &options.relations)
                .await?;
        }

        Ok(handles)
    }

    /// Fetch the first entity matching the options
    pub async fn find_one<E: Entity>(
        &self,
        options: QueryOptions,
    ) -> OrmResult<Option<EntityHandle<E>>> {
        let mut results = self.find::<E>(options.limit(1)).await?;
        Ok(if results.is_empty() {
            None
        } else {
            Some(results.remove(0))
        })
    }

    /// Fetch one entity by primary-key value
    pub async fn find_by_id<E: Entity>(
        &self,
        id: impl Into<Value>,
    ) -> OrmResult<Option<EntityHandle<E>>> {
        let pk = self.registry.primary_key(E::entity_name())?;
        let mut filter = serde_json::Map::new();
        filter.insert(pk.column_name.clone(), id.into());
        self.find_one::<E>(QueryOptions::new().filter(Value::Object(filter)))
            .await
    }

    /// Persist an entity. A missing or null primary-key value means the
    /// instance is new and gets inserted; anything else updates. This is
    /// the single branch point for the decision; no separate persisted
    /// flag exists.
    pub async fn save<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        let pk = self.registry.primary_key(E::entity_name())?;
        let is_new = entity
            .column_value(&pk.name)
            .map_or(true, |v| v.is_null());
        if is_new {
            self.insert(entity).await
        } else {
            self.update(entity).await
        }
    }

    /// [`save`](Self::save) with lifecycle hooks suppressed
    pub async fn save_quietly<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        let pk = self.registry.primary_key(E::entity_name())?;
        let is_new = entity
            .column_value(&pk.name)
            .map_or(true, |v| v.is_null());
        if is_new {
            self.insert_inner(entity, true).await
        } else {
            self.update_inner(entity, true).await
        }
    }

    pub async fn insert<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        self.insert_inner(entity, false).await
    }

    pub async fn insert_quietly<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        self.insert_inner(entity, true).await
    }

    async fn insert_inner<E: Entity>(
        &self,
        mut entity: E,
        quiet: bool,
    ) -> OrmResult<EntityHandle<E>> {
        let meta = self.registry.get(E::entity_name())?;
        if !quiet {
            self.execute_hooks(&mut entity, HookStage::BeforeInsert, &meta)
                .await?;
        }

        let mut values = Vec::new();
        for column in &meta.columns {
            if column.generated {
                continue;
            }
            if let Some(value) = entity.column_value(&column.name) {
                values.push((column.column_name.clone(), value));
            }
        }

        let mut qb = QueryBuilder::new(meta.table.as_str()).insert_values(values);
        let generated_pk = meta.primary_key().filter(|pk| pk.generated).cloned();
        if let Some(pk) = &generated_pk {
            if self.adapter.dialect().supports_returning() {
                qb = qb.returning(pk.column_name.as_str());
            }
        }

        let built = qb.build();
        let result = self.run_query(&built).await?;

        if let Some(pk) = &generated_pk {
            let generated = result
                .rows
                .first()
                .and_then(|row| row.get(&pk.column_name).cloned())
                .filter(|v| !v.is_null())
                .or_else(|| result.last_insert_id.map(Value::from));
            if let Some(raw) = generated {
                let id = coerce_value(pk, raw)?;
                entity.set_column(&pk.name, id)?;
            }
        }

        if !quiet {
            self.execute_hooks(&mut entity, HookStage::AfterInsert, &meta)
                .await?;
        }

        let pk_value = meta
            .primary_key()
            .and_then(|pk| entity.column_value(&pk.name));
        debug!(entity = %meta.name, "inserted");
        Ok(self.attach(entity, pk_value))
    }

    pub async fn update<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        self.update_inner(entity, false).await
    }

    pub async fn update_quietly<E: Entity>(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        self.update_inner(entity, true).await
    }

    async fn update_inner<E: Entity>(
        &self,
        mut entity: E,
        quiet: bool,
    ) -> OrmResult<EntityHandle<E>> {
        let meta = self.registry.get(E::entity_name())?;
        let pk = meta.require_primary_key()?.clone();
        let pk_value = entity
            .column_value(&pk.name)
            .filter(|v| !v.is_null())
            .ok_or(OrmError::MissingPrimaryKey)?;

        if !quiet {
            self.execute_hooks(&mut entity, HookStage::BeforeUpdate, &meta)
                .await?;
        }

        let mut sets = Vec::new();
        for column in &meta.columns {
            if column.primary || column.generated {
                continue;
            }
            if let Some(value) = entity.column_value(&column.name) {
                sets.push((column.column_name.clone(), value));
            }
        }

        if !sets.is_empty() {
            let built = QueryBuilder::new(meta.table.as_str())
                .update_set(sets)
                .where_cond(Condition::eq(pk.column_name.clone(), pk_value.clone()))
                .build();
            self.run_query(&built).await?;
        }

        if !quiet {
            self.execute_hooks(&mut entity, HookStage::AfterUpdate, &meta)
                .await?;
        }

        debug!(entity = %meta.name, "updated");
        Ok(self.attach(entity, Some(pk_value)))
    }

    /// Delete an entity by its primary key, removing it from the identity
    /// map on success
    pub async fn remove<E: Entity>(&self, entity: E) -> OrmResult<()> {
        self.remove_inner(entity, false).await
    }

    pub async fn remove_quietly<E: Entity>(&self, entity: E) -> OrmResult<()> {
        self.remove_inner(entity, true).await
    }

    async fn remove_inner<E: Entity>(&self, mut entity: E, quiet: bool) -> OrmResult<()> {
        let meta = self.registry.get(E::entity_name())?;
        let pk = meta.require_primary_key()?.clone();
        let pk_value = entity
            .column_value(&pk.name)
            .filter(|v| !v.is_null())
            .ok_or(OrmError::MissingPrimaryKey)?;

        if !quiet {
            self.execute_hooks(&mut entity, HookStage::BeforeRemove, &meta)
                .await?;
        }

        let built = QueryBuilder::new(meta.table.as_str())
            .delete()
            .where_cond(Condition::eq(pk.column_name.clone(), pk_value.clone()))
            .build();
        self.run_query(&built).await?;

        self.identity
            .remove(&identity_key(E::entity_name(), &pk_value));

        if !quiet {
            self.execute_hooks(&mut entity, HookStage::AfterRemove, &meta)
                .await?;
        }

        debug!(entity = %meta.name, "removed");
        Ok(())
    }

    /// Count rows matching a filter
    pub async fn count<E: Entity>(&self, filter: Option<Value>) -> OrmResult<i64> {
        let meta = self.registry.get(E::entity_name())?;
        let mut qb = QueryBuilder::new(meta.table.as_str()).select(vec!["COUNT(*) AS count".to_string()]);
        if let Some(filter) = &filter {
            for clause in Condition::parse_list(filter)? {
                qb = qb.where_cond(clause);
            }
        }
        let built = qb.build();
        let result = self.run_query(&built).await?;
        let count = result
            .rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0);
        Ok(count)
    }

    /// Open a transaction. At most one may be current per entity manager;
    /// nesting goes through savepoints.
    pub async fn begin(&self) -> OrmResult<Transaction> {
        if self.current_tx.lock().is_some() {
            return Err(OrmError::InvalidTransaction(
                "a transaction is already active on this entity manager".to_string(),
            ));
        }
        let tx = self.adapter.begin().await?;
        *self.current_tx.lock() = Some(tx.id());
        Ok(tx)
    }

    pub async fn commit(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.adapter.commit(tx).await?;
        self.release_current(tx);
        Ok(())
    }

    pub async fn rollback(&self, tx: &mut Transaction) -> OrmResult<()> {
        self.adapter.rollback(tx).await?;
        self.release_current(tx);
        Ok(())
    }

    pub async fn savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.adapter.savepoint(tx, name).await
    }

    pub async fn rollback_to_savepoint(
        &self,
        tx: &mut Transaction,
        name: &str,
    ) -> OrmResult<()> {
        self.adapter.rollback_to_savepoint(tx, name).await
    }

    pub async fn release_savepoint(&self, tx: &mut Transaction, name: &str) -> OrmResult<()> {
        self.adapter.release_savepoint(tx, name).await
    }

    fn release_current(&self, tx: &Transaction) {
        let mut current = self.current_tx.lock();
        if *current == Some(tx.id()) {
            *current = None;
        }
    }

    /// Run lifecycle hooks registered for `stage` on the instance itself
    pub(crate) async fn execute_hooks<E: Entity>(
        &self,
        entity: &mut E,
        stage: HookStage,
        meta: &EntityMetadata,
    ) -> OrmResult<()> {
        for hook in meta.hooks_for(stage) {
            entity.call_hook(&hook.method).await?;
        }
        Ok(())
    }

    pub(crate) async fn run_query(&self, built: &BuiltQuery) -> OrmResult<QueryResult> {
        self.analyzer.record(&built.sql);
        self.adapter.query(&built.sql, &built.params).await
    }

    /// Fetch raw rows from a table; relation loading works on rows before
    /// hydrating targets.
    pub(crate) async fn fetch_rows(
        &self,
        table: &str,
        condition: Condition,
    ) -> OrmResult<Vec<Row>> {
        let built = QueryBuilder::new(table).where_cond(condition).build();
        Ok(self.run_query(&built).await?.rows)
    }

    /// Hydrate a row into a typed handle through the identity map
    pub(crate) fn hydrate<E: Entity>(
        &self,
        meta: &EntityMetadata,
        row: &Row,
    ) -> OrmResult<EntityHandle<E>> {
        let runtime = self.registry.runtime(E::entity_name())?;
        let erased = self.hydrate_erased(meta, &runtime, row)?;
        downcast_handle::<E>(&erased).ok_or_else(|| {
            OrmError::Serialization(format!(
                "identity map entry for '{}' holds a different type",
                meta.name
            ))
        })
    }

    /// Hydrate a row for an entity known only by name. An existing
    /// identity-map entry is refreshed in place and returned, so repeated
    /// fetches share one instance while hydration stays authoritative for
    /// freshness.
    pub(crate) fn hydrate_erased(
        &self,
        meta: &EntityMetadata,
        runtime: &EntityRuntime,
        row: &Row,
    ) -> OrmResult<ErasedEntity> {
        let pk_value = match meta.primary_key() {
            Some(pk) => match row.get(&pk.column_name) {
                Some(raw) if !raw.is_null() => Some(coerce_value(pk, raw.clone())?),
                _ => None,
            },
            None => None,
        };

        match pk_value {
            Some(pk_value) => {
                let key = identity_key(&meta.name, &pk_value);
                if let Some(existing) = self.identity.get(&key) {
                    runtime.refresh(meta, &existing, row)?;
                    Ok(existing)
                } else {
                    let fresh = runtime.hydrate(meta, row)?;
                    self.identity.insert(key, fresh.clone());
                    Ok(fresh)
                }
            }
            // No usable primary key: hydrate outside the identity map.
            None => runtime.hydrate(meta, row),
        }
    }

    /// Route a locally mutated instance through the identity map: refresh
    /// the existing handle's contents or insert a new one.
    fn attach<E: Entity>(&self, entity: E, pk_value: Option<Value>) -> EntityHandle<E> {
        match pk_value {
            Some(value) if !value.is_null() => {
                let key = identity_key(E::entity_name(), &value);
                if let Some(existing) = self.identity.get(&key) {
                    if let Some(handle) = downcast_handle::<E>(&existing) {
                        *handle.write() = entity;
                        return handle;
                    }
                }
                let handle: EntityHandle<E> = Arc::new(RwLock::new(entity));
                self.identity.insert(key, handle.clone());
                handle
            }
            _ => Arc::new(RwLock::new(entity)),
        }
    }
}
