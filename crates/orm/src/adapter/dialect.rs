//! SQL dialects - the per-engine differences layered over the neutral
//! builder output
//!
//! A dialect owns placeholder style, identifier quoting, default isolation,
//! DDL type names, and schema introspection statements. Everything else is
//! shared adapter logic.

use crate::adapter::transaction::IsolationLevel;
use crate::metadata::{ColumnMetadata, ColumnType};

/// Parameter placeholder style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` - the builder's native form
    Numbered,
    /// `?` - re-indexed at execution time
    Positional,
}

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDialect {
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            SqlDialect::Postgres => PlaceholderStyle::Numbered,
            SqlDialect::MySql | SqlDialect::Sqlite => PlaceholderStyle::Positional,
        }
    }

    /// Quote an identifier for this dialect
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            SqlDialect::Postgres | SqlDialect::Sqlite => format!("\"{}\"", identifier),
            SqlDialect::MySql => format!("`{}`", identifier),
        }
    }

    /// Isolation level a fresh transaction reports on begin
    pub fn default_isolation(&self) -> IsolationLevel {
        match self {
            SqlDialect::Postgres => IsolationLevel::ReadCommitted,
            SqlDialect::MySql => IsolationLevel::RepeatableRead,
            SqlDialect::Sqlite => IsolationLevel::Serializable,
        }
    }

    /// Whether INSERT ... RETURNING can surface generated keys
    pub fn supports_returning(&self) -> bool {
        match self {
            SqlDialect::Postgres | SqlDialect::Sqlite => true,
            SqlDialect::MySql => false,
        }
    }

    pub fn current_timestamp(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "NOW()",
            SqlDialect::MySql => "CURRENT_TIMESTAMP",
            SqlDialect::Sqlite => "datetime('now')",
        }
    }

    /// DDL type name for a column definition
    pub fn type_name(&self, column: &ColumnMetadata) -> String {
        match column.column_type {
            ColumnType::String => match self {
                SqlDialect::Sqlite => "TEXT".to_string(),
                _ => format!("VARCHAR({})", column.length.unwrap_or(255)),
            },
            ColumnType::Number => match (column.precision, column.scale) {
                (Some(precision), Some(scale)) => match self {
                    SqlDialect::MySql => format!("DECIMAL({}, {})", precision, scale),
                    _ => format!("NUMERIC({}, {})", precision, scale),
                },
                _ => match self {
                    SqlDialect::Sqlite => "INTEGER".to_string(),
                    _ => "BIGINT".to_string(),
                },
            },
            ColumnType::Boolean => match self {
                SqlDialect::Postgres => "BOOLEAN".to_string(),
                SqlDialect::MySql => "TINYINT(1)".to_string(),
                SqlDialect::Sqlite => "INTEGER".to_string(),
            },
            ColumnType::Date => match self {
                SqlDialect::Postgres => "TIMESTAMPTZ".to_string(),
                SqlDialect::MySql => "DATETIME".to_string(),
                SqlDialect::Sqlite => "TEXT".to_string(),
            },
            ColumnType::Json => match self {
                SqlDialect::Postgres => "JSONB".to_string(),
                SqlDialect::MySql => "JSON".to_string(),
                SqlDialect::Sqlite => "TEXT".to_string(),
            },
            ColumnType::Uuid => match self {
                SqlDialect::Postgres => "UUID".to_string(),
                SqlDialect::MySql => "CHAR(36)".to_string(),
                SqlDialect::Sqlite => "TEXT".to_string(),
            },
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Blob => match self {
                SqlDialect::Postgres => "BYTEA".to_string(),
                _ => "BLOB".to_string(),
            },
        }
    }

    /// DDL fragment for a generated primary-key column
    pub fn generated_primary_key(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "BIGSERIAL PRIMARY KEY",
            SqlDialect::MySql => "BIGINT AUTO_INCREMENT PRIMARY KEY",
            SqlDialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Statement listing a table's columns; empty result means the table
    /// does not exist
    pub fn table_columns_sql(&self, table: &str) -> String {
        match self {
            SqlDialect::Postgres | SqlDialect::MySql => format!(
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                 WHERE table_name = '{}' ORDER BY ordinal_position",
                table
            ),
            SqlDialect::Sqlite => format!("PRAGMA table_info({})", table),
        }
    }

    /// Rewrite the dialect-neutral `$n` statement for this dialect:
    /// positional-placeholder engines get `?`, and MySQL's OFFSET requires
    /// an explicit LIMIT.
    pub fn rewrite(&self, sql: &str) -> String {
        let mut out = match self.placeholder_style() {
            PlaceholderStyle::Numbered => sql.to_string(),
            PlaceholderStyle::Positional => reindex_placeholders(sql),
        };
        if matches!(self, SqlDialect::MySql) && out.contains(" OFFSET ") && !out.contains(" LIMIT ")
        {
            if let Some(pos) = out.find(" OFFSET ") {
                out.insert_str(pos, " LIMIT 18446744073709551615");
            }
        }
        out
    }
}

/// Replace `$n` placeholders with `?`, skipping string literals. The
/// builder numbers parameters sequentially, so positional order is already
/// correct.
fn reindex_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if ch == '\'' {
            in_string = !in_string;
            out.push(ch);
            continue;
        }
        if !in_string && ch == '$' && chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
            out.push('?');
            continue;
        }
        out.push(ch);
    }
    out
}
