//! Shared test fixtures: an in-memory driver with a query journal and a
//! small blog-shaped entity graph.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use relic_orm::{
    ColumnMetadata, ColumnType, Driver, Entity, EntityHandle, EntityMetadata, HookMetadata,
    HookStage, IndexMetadata, MetadataRegistry, OrmResult, QueryResult, RelationMetadata,
    RelationValue, Row,
};

/// Scripted in-memory driver. SELECT-ish statements pop canned results
/// from a queue (empty result when the queue is dry); INSERTs fabricate
/// generated keys; everything is journaled.
pub struct MemoryDriver {
    journal: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<QueryResult>>,
    next_id: AtomicI64,
}

impl MemoryDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            journal: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
        })
    }

    /// Queue rows for the next SELECT-shaped statement
    pub fn queue_rows(&self, rows: Vec<Row>) {
        self.responses.lock().push_back(QueryResult::with_rows(rows));
    }

    pub fn queue_result(&self, result: QueryResult) {
        self.responses.lock().push_back(result);
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.journal.lock().clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.journal.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Journal entries whose SQL starts with the given keyword
    pub fn executed_matching(&self, prefix: &str) -> Vec<String> {
        self.executed_sql()
            .into_iter()
            .filter(|sql| sql.starts_with(prefix))
            .collect()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(&self) -> OrmResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> OrmResult<()> {
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryResult> {
        self.journal.lock().push((sql.to_string(), params.to_vec()));
        let upper = sql.trim_start().to_ascii_uppercase();

        if upper.starts_with("SELECT") || upper.starts_with("PRAGMA") {
            return Ok(self
                .responses
                .lock()
                .pop_front()
                .unwrap_or_else(QueryResult::empty));
        }

        if upper.starts_with("INSERT") {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            if let Some(column) = sql.rsplit(" RETURNING ").next().filter(|_| sql.contains(" RETURNING ")) {
                let mut row = Row::new();
                row.set(column.trim(), Value::from(id));
                let mut result = QueryResult::with_rows(vec![row]);
                result.last_insert_id = Some(id);
                return Ok(result);
            }
            let mut result = QueryResult::empty();
            result.row_count = 1;
            result.last_insert_id = Some(id);
            return Ok(result);
        }

        let mut result = QueryResult::empty();
        result.row_count = 1;
        Ok(result)
    }
}

/// Build a row from column/value pairs
pub fn row(pairs: &[(&str, Value)]) -> Row {
    let mut row = Row::new();
    for (column, value) in pairs {
        row.set(*column, value.clone());
    }
    row
}

/// Register the whole fixture graph on a fresh registry
pub fn fixture_registry() -> Arc<MetadataRegistry> {
    let registry = Arc::new(MetadataRegistry::new());
    registry.register::<User>();
    registry.register::<Post>();
    registry.register::<Profile>();
    registry.register::<Tag>();
    registry
}

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub name: Option<String>,
    pub active: bool,
    pub created_at: Option<String>,
    pub posts: Vec<EntityHandle<Post>>,
    pub profile: Option<EntityHandle<Profile>>,
    pub tags: Vec<EntityHandle<Tag>>,
    pub hook_calls: Vec<String>,
}

#[async_trait]
impl Entity for User {
    fn entity_name() -> &'static str {
        "User"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("User", "users")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(
                ColumnMetadata::new("email", ColumnType::String)
                    .with_length(320)
                    .unique(),
            )
            .with_column(ColumnMetadata::new("name", ColumnType::String).nullable())
            .with_column(ColumnMetadata::new("active", ColumnType::Boolean))
            .with_column(ColumnMetadata::new("created_at", ColumnType::Date).nullable())
            .with_relation(RelationMetadata::one_to_many("posts", "Post").with_join_column("user_id"))
            .with_relation(
                RelationMetadata::one_to_one("profile", "Profile").with_join_column("user_id"),
            )
            .with_relation(
                RelationMetadata::many_to_many("tags", "Tag")
                    .with_join_table("user_tags")
                    .with_join_column("user_id")
                    .with_inverse_join_column("tag_id"),
            )
            .with_hook(HookMetadata::new(HookStage::BeforeInsert, "normalize_email"))
            .with_hook(HookMetadata::new(HookStage::AfterInsert, "after_insert"))
            .with_hook(HookMetadata::new(HookStage::BeforeRemove, "before_remove"))
            .with_hook(HookMetadata::new(HookStage::AfterRemove, "after_remove"))
            .with_index(IndexMetadata::new("idx_users_email", vec!["email".into()]).unique())
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => self.id.map(Value::from),
            "email" => Some(Value::from(self.email.clone())),
            "name" => self.name.clone().map(Value::from),
            "active" => Some(Value::from(self.active)),
            "created_at" => self.created_at.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = value.as_i64(),
            "email" => self.email = value.as_str().unwrap_or_default().to_string(),
            "name" => self.name = value.as_str().map(String::from),
            "active" => self.active = value.as_bool().unwrap_or(false),
            "created_at" => self.created_at = value.as_str().map(String::from),
            _ => {}
        }
        Ok(())
    }

    fn set_relation(&mut self, relation: &str, value: RelationValue) -> OrmResult<()> {
        match (relation, value) {
            ("posts", RelationValue::Many(items)) => {
                self.posts = items
                    .iter()
                    .filter_map(relic_orm::downcast_handle::<Post>)
                    .collect();
            }
            ("profile", RelationValue::One(item)) => {
                self.profile = item.as_ref().and_then(relic_orm::downcast_handle::<Profile>);
            }
            ("tags", RelationValue::Many(items)) => {
                self.tags = items
                    .iter()
                    .filter_map(relic_orm::downcast_handle::<Tag>)
                    .collect();
            }
            _ => {}
        }
        Ok(())
    }

    async fn call_hook(&mut self, method: &str) -> OrmResult<()> {
        self.hook_calls.push(method.to_string());
        if method == "normalize_email" {
            self.email = self.email.to_lowercase();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub title: String,
    pub author: Option<EntityHandle<User>>,
}

#[async_trait]
impl Entity for Post {
    fn entity_name() -> &'static str {
        "Post"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("Post", "posts")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(ColumnMetadata::new("user_id", ColumnType::Number).nullable())
            .with_column(ColumnMetadata::new("title", ColumnType::String))
            .with_relation(RelationMetadata::many_to_one("author", "User").with_join_column("user_id"))
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => self.id.map(Value::from),
            "user_id" => self.user_id.map(Value::from),
            "title" => Some(Value::from(self.title.clone())),
            _ => None,
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = value.as_i64(),
            "user_id" => self.user_id = value.as_i64(),
            "title" => self.title = value.as_str().unwrap_or_default().to_string(),
            _ => {}
        }
        Ok(())
    }

    fn set_relation(&mut self, relation: &str, value: RelationValue) -> OrmResult<()> {
        if relation == "author" {
            if let RelationValue::One(item) = value {
                self.author = item.as_ref().and_then(relic_orm::downcast_handle::<User>);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub bio: Option<String>,
}

#[async_trait]
impl Entity for Profile {
    fn entity_name() -> &'static str {
        "Profile"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("Profile", "profiles")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(ColumnMetadata::new("user_id", ColumnType::Number).nullable())
            .with_column(ColumnMetadata::new("bio", ColumnType::Text).nullable())
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => self.id.map(Value::from),
            "user_id" => self.user_id.map(Value::from),
            "bio" => self.bio.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = value.as_i64(),
            "user_id" => self.user_id = value.as_i64(),
            "bio" => self.bio = value.as_str().map(String::from),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub id: Option<i64>,
    pub label: String,
}

#[async_trait]
impl Entity for Tag {
    fn entity_name() -> &'static str {
        "Tag"
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::new("Tag", "tags")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(ColumnMetadata::new("label", ColumnType::String))
    }

    fn column_value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => self.id.map(Value::from),
            "label" => Some(Value::from(self.label.clone())),
            _ => None,
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> OrmResult<()> {
        match column {
            "id" => self.id = value.as_i64(),
            "label" => self.label = value.as_str().unwrap_or_default().to_string(),
            _ => {}
        }
        Ok(())
    }
}
