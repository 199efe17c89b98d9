//! Row-value coercion
//!
//! Raw driver values are normalized to the column's logical type before
//! they reach `Entity::set_column`: dates parse to RFC 3339, JSON strings
//! parse to structured values, booleans and numbers coerce across the
//! representations the three engines produce.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::metadata::{ColumnMetadata, ColumnType};

pub(crate) fn coerce_value(column: &ColumnMetadata, raw: Value) -> OrmResult<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match column.column_type {
        ColumnType::Date => coerce_date(column, raw),
        ColumnType::Json => coerce_json(raw),
        ColumnType::Boolean => coerce_boolean(column, raw),
        ColumnType::Number => coerce_number(column, raw),
        ColumnType::Uuid => coerce_uuid(column, raw),
        ColumnType::String | ColumnType::Text | ColumnType::Blob => Ok(raw),
    }
}

/// Normalize the engine-specific date representations to RFC 3339.
/// SQLite hands back bare text, MySQL a space-separated datetime, and
/// numeric epochs appear from drivers that decode timestamps as integers.
fn coerce_date(column: &ColumnMetadata, raw: Value) -> OrmResult<Value> {
    match &raw {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Value::String(dt.with_timezone(&Utc).to_rfc3339()));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Ok(Value::String(naive.and_utc().to_rfc3339()));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Value::String(midnight.and_utc().to_rfc3339()));
                }
            }
            Err(coercion_error(column, &raw, "date"))
        }
        Value::Number(n) => {
            let seconds = n.as_i64().ok_or_else(|| coercion_error(column, &raw, "date"))?;
            let dt = DateTime::<Utc>::from_timestamp(seconds, 0)
                .ok_or_else(|| coercion_error(column, &raw, "date"))?;
            Ok(Value::String(dt.to_rfc3339()))
        }
        _ => Err(coercion_error(column, &raw, "date")),
    }
}

/// Engines without a native JSON type return text; parse it through.
fn coerce_json(raw: Value) -> OrmResult<Value> {
    match raw {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => Ok(parsed),
            // Not JSON text after all; keep the string as-is.
            Err(_) => Ok(Value::String(s)),
        },
        other => Ok(other),
    }
}

fn coerce_boolean(column: &ColumnMetadata, raw: Value) -> OrmResult<Value> {
    match &raw {
        Value::Bool(_) => Ok(raw),
        Value::Number(n) => Ok(Value::Bool(n.as_i64().unwrap_or(0) != 0)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(coercion_error(column, &raw, "boolean")),
        },
        _ => Err(coercion_error(column, &raw, "boolean")),
    }
}

fn coerce_number(column: &ColumnMetadata, raw: Value) -> OrmResult<Value> {
    match &raw {
        Value::Number(_) => Ok(raw),
        Value::String(s) => {
            if let Ok(int) = s.parse::<i64>() {
                return Ok(Value::from(int));
            }
            if let Ok(float) = s.parse::<f64>() {
                return serde_json::Number::from_f64(float)
                    .map(Value::Number)
                    .ok_or_else(|| coercion_error(column, &raw, "number"));
            }
            Err(coercion_error(column, &raw, "number"))
        }
        Value::Bool(b) => Ok(Value::from(if *b { 1 } else { 0 })),
        _ => Err(coercion_error(column, &raw, "number")),
    }
}

fn coerce_uuid(column: &ColumnMetadata, raw: Value) -> OrmResult<Value> {
    match &raw {
        Value::String(s) => uuid::Uuid::parse_str(s)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| coercion_error(column, &raw, "uuid")),
        _ => Err(coercion_error(column, &raw, "uuid")),
    }
}

fn coercion_error(column: &ColumnMetadata, raw: &Value, expected: &str) -> OrmError {
    OrmError::Serialization(format!(
        "cannot coerce value {} in column '{}' to {}",
        raw, column.column_name, expected
    ))
}
