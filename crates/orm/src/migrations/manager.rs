//! Migration planning and execution

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{Adapter, Row, SqlDialect};
use crate::error::{OrmError, OrmResult};
use crate::metadata::{ColumnMetadata, ColumnType, EntityMetadata, MetadataRegistry};
use crate::migrations::{
    default_literal, IntrospectedColumn, MigrationRecord, PlannedMigration,
    TRACKING_TABLE,
};
use crate::query::QueryBuilder;

pub struct MigrationManager {
    registry: Arc<MetadataRegistry>,
    adapter: Arc<dyn Adapter>,
}

impl MigrationManager {
    pub fn new(registry: Arc<MetadataRegistry>, adapter: Arc<dyn Adapter>) -> Self {
        Self { registry, adapter }
    }

    /// Create the tracking table when it does not exist yet
    pub async fn ensure_tracking_table(&self) -> OrmResult<()> {
        let dialect = self.adapter.dialect();
        let name_type = dialect.type_name(&ColumnMetadata::new("name", ColumnType::String).with_length(255));
        let text_type = dialect.type_name(&ColumnMetadata::new("up", ColumnType::Text));
        let int_type = dialect.type_name(&ColumnMetadata::new("timestamp", ColumnType::Number));
        let checksum_type =
            dialect.type_name(&ColumnMetadata::new("checksum", ColumnType::String).with_length(32));
        let date_type = dialect.type_name(&ColumnMetadata::new("applied_at", ColumnType::Date));

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id {}, name {} NOT NULL, up {} NOT NULL, down {} NOT NULL, \
             timestamp {} NOT NULL, checksum {} NOT NULL, applied_at {})",
            TRACKING_TABLE,
            dialect.generated_primary_key(),
            name_type,
            text_type,
            text_type,
            int_type,
            checksum_type,
            date_type,
        );
        self.adapter.query(&sql, &[]).await?;
        Ok(())
    }

    /// Columns the database currently reports for a table; empty means the
    /// table does not exist.
    pub async fn current_columns(&self, table: &str) -> OrmResult<Vec<IntrospectedColumn>> {
        let dialect = self.adapter.dialect();
        let result = self
            .adapter
            .query(&dialect.table_columns_sql(table), &[])
            .await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| parse_introspection_row(dialect, row))
            .collect())
    }

    /// Diff every registered entity against the reported schema and emit
    /// ordered migrations. Entities already in sync produce nothing.
    pub async fn plan(&self) -> OrmResult<Vec<PlannedMigration>> {
        let timestamp = Utc::now().timestamp();
        let dialect = self.adapter.dialect();
        let mut plans = Vec::new();

        for meta in self.registry.all() {
            let existing = self.current_columns(&meta.table).await?;
            let (up, down) = diff_entity(dialect, &meta, &existing);
            if up.is_empty() {
                continue;
            }
            plans.push(PlannedMigration::new(
                format!("sync_{}", meta.table),
                up,
                down,
                timestamp,
            ));
        }

        debug!(migrations = plans.len(), "schema diff planned");
        Ok(plans)
    }

    /// Migrations recorded as applied, oldest first
    pub async fn applied(&self) -> OrmResult<Vec<MigrationRecord>> {
        self.ensure_tracking_table().await?;
        let sql = format!("SELECT * FROM {} ORDER BY id", TRACKING_TABLE);
        let result = self.adapter.query(&sql, &[]).await?;
        Ok(result.rows.iter().filter_map(parse_record).collect())
    }

    /// Execute one planned migration inside a transaction and record it.
    /// Re-applying an identical plan is a no-op; a same-name plan with a
    /// different checksum is drift and fails.
    pub async fn apply(&self, plan: &PlannedMigration) -> OrmResult<()> {
        self.ensure_tracking_table().await?;

        if let Some(existing) = self
            .applied()
            .await?
            .into_iter()
            .find(|r| r.name == plan.name)
        {
            if existing.checksum == plan.checksum {
                debug!(name = %plan.name, "migration already applied");
                return Ok(());
            }
            return Err(OrmError::Migration(format!(
                "checksum mismatch for applied migration '{}'",
                plan.name
            )));
        }

        let mut tx = self.adapter.begin().await?;
        for statement in &plan.up {
            if let Err(err) = self.adapter.query(statement, &[]).await {
                warn!(name = %plan.name, %err, "migration failed; rolling back");
                self.adapter.rollback(&mut tx).await?;
                return Err(err);
            }
        }

        let record = QueryBuilder::new(TRACKING_TABLE)
            .insert_values(vec![
                ("name".to_string(), Value::from(plan.name.clone())),
                ("up".to_string(), Value::from(plan.up.join(";\n"))),
                ("down".to_string(), Value::from(plan.down.join(";\n"))),
                ("timestamp".to_string(), Value::from(plan.timestamp)),
                ("checksum".to_string(), Value::from(plan.checksum.clone())),
                (
                    "applied_at".to_string(),
                    Value::from(Utc::now().to_rfc3339()),
                ),
            ])
            .build();
        if let Err(err) = self.adapter.query(&record.sql, &record.params).await {
            self.adapter.rollback(&mut tx).await?;
            return Err(err);
        }

        self.adapter.commit(&mut tx).await?;
        debug!(name = %plan.name, statements = plan.up.len(), "migration applied");
        Ok(())
    }

    /// Apply every planned migration in order
    pub async fn apply_all(&self) -> OrmResult<usize> {
        let plans = self.plan().await?;
        let count = plans.len();
        for plan in &plans {
            self.apply(plan).await?;
        }
        Ok(count)
    }

    /// Revert the most recently applied migration using its recorded down
    /// statements
    pub async fn revert_last(&self) -> OrmResult<()> {
        let record = self
            .applied()
            .await?
            .pop()
            .ok_or_else(|| OrmError::Migration("no applied migrations to revert".to_string()))?;

        let mut tx = self.adapter.begin().await?;
        for statement in record.down.split(";\n").filter(|s| !s.trim().is_empty()) {
            if let Err(err) = self.adapter.query(statement, &[]).await {
                self.adapter.rollback(&mut tx).await?;
                return Err(err);
            }
        }

        let delete = QueryBuilder::new(TRACKING_TABLE)
            .delete()
            .where_cond(crate::query::Condition::eq("id", record.id))
            .build();
        if let Err(err) = self.adapter.query(&delete.sql, &delete.params).await {
            self.adapter.rollback(&mut tx).await?;
            return Err(err);
        }

        self.adapter.commit(&mut tx).await?;
        debug!(name = %record.name, "migration reverted");
        Ok(())
    }
}

/// Pure diff for one entity: DDL to bring the reported schema up to the
/// declared one, plus the reverse statements.
pub fn diff_entity(
    dialect: SqlDialect,
    meta: &EntityMetadata,
    existing: &[IntrospectedColumn],
) -> (Vec<String>, Vec<String>) {
    if existing.is_empty() {
        let mut up = vec![render_create_table(dialect, meta)];
        for index in &meta.indexes {
            let unique = if index.unique { "UNIQUE " } else { "" };
            up.push(format!(
                "CREATE {}INDEX {} ON {} ({})",
                unique,
                index.name,
                meta.table,
                index.columns.join(", ")
            ));
        }
        let down = vec![format!("DROP TABLE {}", meta.table)];
        return (up, down);
    }

    let mut up = Vec::new();
    let mut down = Vec::new();

    for column in &meta.columns {
        if !existing.iter().any(|c| c.name == column.column_name) {
            up.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                meta.table,
                render_column(dialect, column)
            ));
            down.push(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                meta.table, column.column_name
            ));
        }
    }

    for column in existing {
        if meta.column(&column.name).is_none() {
            up.push(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                meta.table, column.name
            ));
            // Restore with the type the database reported.
            let nullability = if column.nullable { "" } else { " NOT NULL" };
            down.push(format!(
                "ALTER TABLE {} ADD COLUMN {} {}{}",
                meta.table, column.name, column.data_type, nullability
            ));
        }
    }

    (up, down)
}

fn render_create_table(dialect: SqlDialect, meta: &EntityMetadata) -> String {
    let columns: Vec<String> = meta
        .columns
        .iter()
        .map(|column| render_column(dialect, column))
        .collect();
    format!("CREATE TABLE {} ({})", meta.table, columns.join(", "))
}

fn render_column(dialect: SqlDialect, column: &ColumnMetadata) -> String {
    if column.primary && column.generated {
        return format!("{} {}", column.column_name, dialect.generated_primary_key());
    }

    let mut def = format!("{} {}", column.column_name, dialect.type_name(column));
    if column.primary {
        def.push_str(" PRIMARY KEY");
    } else if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if column.unique && !column.primary {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        def.push_str(&format!(" DEFAULT {}", default_literal(default)));
    }
    def
}

/// Normalize one introspection row. information_schema reports
/// column_name/data_type/is_nullable; PRAGMA reports name/type/notnull.
fn parse_introspection_row(dialect: SqlDialect, row: &Row) -> Option<IntrospectedColumn> {
    match dialect {
        SqlDialect::Postgres | SqlDialect::MySql => Some(IntrospectedColumn {
            name: row.get("column_name")?.as_str()?.to_string(),
            data_type: row
                .get("data_type")
                .and_then(|v| v.as_str())
                .unwrap_or("text")
                .to_string(),
            nullable: row
                .get("is_nullable")
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.eq_ignore_ascii_case("yes")),
        }),
        SqlDialect::Sqlite => Some(IntrospectedColumn {
            name: row.get("name")?.as_str()?.to_string(),
            data_type: row
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("TEXT")
                .to_string(),
            nullable: row
                .get("notnull")
                .and_then(|v| v.as_i64())
                .unwrap_or(0)
                == 0,
        }),
    }
}

fn parse_record(row: &Row) -> Option<MigrationRecord> {
    Some(MigrationRecord {
        id: row.get("id").and_then(|v| v.as_i64())?,
        name: row.get("name")?.as_str()?.to_string(),
        up: row
            .get("up")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        down: row
            .get("down")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        timestamp: row.get("timestamp").and_then(|v| v.as_i64()).unwrap_or(0),
        checksum: row
            .get("checksum")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        applied_at: row
            .get("applied_at")
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}
