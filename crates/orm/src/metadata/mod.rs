//! Entity Metadata - column, relation, hook, and index definitions
//!
//! Metadata is declared once per entity type at bootstrap as plain data
//! and is immutable afterwards. The registry in [`registry`] is the single
//! source of truth for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

pub mod registry;

pub use registry::{EntityRuntime, MetadataRegistry};

/// Logical column types understood by hydration and the migration planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    Uuid,
    Text,
    Blob,
}

/// Column definition for one entity property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Logical property name on the entity
    pub name: String,
    /// Physical column name in the table
    pub column_name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary: bool,
    pub generated: bool,
    pub unique: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub default: Option<Value>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            column_name: name.clone(),
            name,
            column_type,
            nullable: false,
            primary: false,
            generated: false,
            unique: false,
            length: None,
            precision: None,
            scale: None,
            default: None,
        }
    }

    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Kinds of relationships between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Returns true if this relation resolves to a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Returns true if this relation goes through a join table
    pub fn uses_join_table(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Relationship definition for one entity property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMetadata {
    /// Property name on the owning entity
    pub name: String,
    pub kind: RelationKind,
    /// Logical name of the target entity
    pub target: String,
    /// Foreign-key column; resolved by `<entity>_id` convention when absent
    pub join_column: Option<String>,
    /// Join table for many-to-many relations
    pub join_table: Option<String>,
    /// Target-side column in the join table
    pub inverse_join_column: Option<String>,
    pub cascade: bool,
    pub eager: bool,
}

impl RelationMetadata {
    pub fn new(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            join_column: None,
            join_table: None,
            inverse_join_column: None,
            cascade: false,
            eager: false,
        }
    }

    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToOne, target)
    }

    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToMany, target)
    }

    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToOne, target)
    }

    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToMany, target)
    }

    pub fn with_join_column(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into());
        self
    }

    pub fn with_join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    pub fn with_inverse_join_column(mut self, column: impl Into<String>) -> Self {
        self.inverse_join_column = Some(column.into());
        self
    }

    pub fn cascading(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// The foreign-key column, falling back to the `<name>_id` convention
    /// against `fallback_entity` (the side that holds the key).
    pub fn join_column_or_convention(&self, fallback_entity: &str) -> String {
        self.join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", snake_case(fallback_entity)))
    }
}

/// Lifecycle stages at which entity hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookStage {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeRemove,
    AfterRemove,
}

/// One registered lifecycle hook: the stage plus the entity method to call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookMetadata {
    pub stage: HookStage,
    pub method: String,
}

impl HookMetadata {
    pub fn new(stage: HookStage, method: impl Into<String>) -> Self {
        Self {
            stage,
            method: method.into(),
        }
    }
}

/// Index definition consumed by the migration planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Complete shape of one registered entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Logical entity name
    pub name: String,
    /// Physical table name
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
    pub hooks: Vec<HookMetadata>,
    pub indexes: Vec<IndexMetadata>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            hooks: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_hook(mut self, hook: HookMetadata) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.indexes.push(index);
        self
    }

    /// First column flagged primary, if any. Absence is an error only at
    /// the point of an id-based operation, not at registration.
    pub fn primary_key(&self) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.primary)
    }

    /// Like [`primary_key`](Self::primary_key) but raising the hard
    /// precondition failure id-based operations require.
    pub fn require_primary_key(&self) -> OrmResult<&ColumnMetadata> {
        self.primary_key()
            .ok_or_else(|| OrmError::NoPrimaryKey(self.name.clone()))
    }

    /// Look up a column by logical or physical name
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name == name || c.column_name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn hooks_for(&self, stage: HookStage) -> impl Iterator<Item = &HookMetadata> {
        self.hooks.iter().filter(move |h| h.stage == stage)
    }
}

/// Convert an entity name like `UserProfile` to `user_profile`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_builder_defaults() {
        let col = ColumnMetadata::new("email", ColumnType::String)
            .with_length(255)
            .unique();
        assert_eq!(col.name, "email");
        assert_eq!(col.column_name, "email");
        assert_eq!(col.length, Some(255));
        assert!(col.unique);
        assert!(!col.nullable);
        assert!(!col.primary);
    }

    #[test]
    fn relation_kind_properties() {
        assert!(RelationKind::OneToMany.is_collection());
        assert!(RelationKind::ManyToMany.is_collection());
        assert!(!RelationKind::ManyToOne.is_collection());
        assert!(RelationKind::ManyToMany.uses_join_table());
        assert!(!RelationKind::OneToOne.uses_join_table());
    }

    #[test]
    fn join_column_convention() {
        let rel = RelationMetadata::many_to_one("author", "User");
        assert_eq!(rel.join_column_or_convention("User"), "user_id");

        let explicit = RelationMetadata::many_to_one("author", "User").with_join_column("writer_id");
        assert_eq!(explicit.join_column_or_convention("User"), "writer_id");
    }

    #[test]
    fn snake_case_handles_camel_humps() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(snake_case("order"), "order");
    }

    #[test]
    fn primary_key_lookup() {
        let meta = EntityMetadata::new("User", "users")
            .with_column(ColumnMetadata::new("id", ColumnType::Number).primary().generated())
            .with_column(ColumnMetadata::new("email", ColumnType::String));
        assert_eq!(meta.primary_key().map(|c| c.name.as_str()), Some("id"));
        assert!(meta.require_primary_key().is_ok());

        let bare = EntityMetadata::new("Log", "logs")
            .with_column(ColumnMetadata::new("line", ColumnType::Text));
        assert!(matches!(
            bare.require_primary_key(),
            Err(OrmError::NoPrimaryKey(_))
        ));
    }

    #[test]
    fn hooks_filter_by_stage() {
        let meta = EntityMetadata::new("User", "users")
            .with_hook(HookMetadata::new(HookStage::BeforeInsert, "hash_password"))
            .with_hook(HookMetadata::new(HookStage::BeforeInsert, "normalize_email"))
            .with_hook(HookMetadata::new(HookStage::AfterRemove, "log_removal"));
        let before: Vec<_> = meta
            .hooks_for(HookStage::BeforeInsert)
            .map(|h| h.method.as_str())
            .collect();
        assert_eq!(before, vec!["hash_password", "normalize_email"]);
    }
}
