//! Identity map
//!
//! One live handle per (entity type, primary key) pair for the lifetime of
//! an entity manager. Writes are last-write-wins; hydration refreshes the
//! contents of an existing handle rather than replacing it, so held
//! references stay current.

use dashmap::DashMap;
use serde_json::Value;

use crate::entity::ErasedEntity;

#[derive(Default)]
pub(crate) struct IdentityMap {
    entries: DashMap<String, ErasedEntity>,
}

/// Map key for one instance: `"{EntityName}:{primaryKeyValue}"`
pub(crate) fn identity_key(entity_name: &str, pk: &Value) -> String {
    let pk_text = match pk {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{}:{}", entity_name, pk_text)
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ErasedEntity> {
        self.entries.get(key).map(|e| e.clone())
    }

    pub fn insert(&self, key: String, entity: ErasedEntity) {
        self.entries.insert(key, entity);
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
