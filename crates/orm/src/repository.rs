//! Repository - typed convenience façade over the entity manager

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::entity::{Entity, EntityHandle};
use crate::error::OrmResult;
use crate::manager::{EntityManager, QueryOptions};

/// Thin typed wrapper offering the common finder shapes for one entity
/// type. All heavy lifting stays in the entity manager.
pub struct Repository<E: Entity> {
    em: Arc<EntityManager>,
    _entity: PhantomData<E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(em: Arc<EntityManager>) -> Self {
        Self {
            em,
            _entity: PhantomData,
        }
    }

    pub fn entity_manager(&self) -> &Arc<EntityManager> {
        &self.em
    }

    pub async fn find(&self, options: QueryOptions) -> OrmResult<Vec<EntityHandle<E>>> {
        self.em.find::<E>(options).await
    }

    pub async fn find_all(&self) -> OrmResult<Vec<EntityHandle<E>>> {
        self.em.find::<E>(QueryOptions::new()).await
    }

    pub async fn find_one(&self, options: QueryOptions) -> OrmResult<Option<EntityHandle<E>>> {
        self.em.find_one::<E>(options).await
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> OrmResult<Option<EntityHandle<E>>> {
        self.em.find_by_id::<E>(id).await
    }

    /// Fetch rows whose column is in `values`. An empty list matches
    /// nothing and short-circuits without touching the adapter.
    pub async fn find_where_in(
        &self,
        column: &str,
        values: Vec<Value>,
    ) -> OrmResult<Vec<EntityHandle<E>>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut filter = serde_json::Map::new();
        filter.insert(column.to_string(), json!({ "$in": values }));
        self.em
            .find::<E>(QueryOptions::new().filter(Value::Object(filter)))
            .await
    }

    pub async fn count(&self, filter: Option<Value>) -> OrmResult<i64> {
        self.em.count::<E>(filter).await
    }

    pub async fn save(&self, entity: E) -> OrmResult<EntityHandle<E>> {
        self.em.save(entity).await
    }

    pub async fn remove(&self, entity: E) -> OrmResult<()> {
        self.em.remove(entity).await
    }
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            em: self.em.clone(),
            _entity: PhantomData,
        }
    }
}
