//! Entity validation
//!
//! Violations are collected and returned as a list rather than raised, so
//! callers can report every problem in one pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;
use crate::metadata::{ColumnType, EntityMetadata};

/// One validation violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub value: Value,
    pub code: String,
}

impl ValidationError {
    fn new(field: &str, message: String, value: Value, code: &str) -> Self {
        Self {
            field: field.to_string(),
            message,
            value,
            code: code.to_string(),
        }
    }
}

/// Check an instance against its declared metadata. Returns every
/// violation found; an empty list means the instance is valid.
pub fn validate_entity<E: Entity>(meta: &EntityMetadata, entity: &E) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for column in &meta.columns {
        let value = entity.column_value(&column.name);

        let missing = matches!(&value, None | Some(Value::Null));
        if missing {
            if !column.nullable && !column.generated && column.default.is_none() {
                errors.push(ValidationError::new(
                    &column.name,
                    format!("'{}' must not be null", column.name),
                    Value::Null,
                    "required",
                ));
            }
            continue;
        }
        let value = value.unwrap_or(Value::Null);

        if let (Some(max), Value::String(s)) = (column.length, &value) {
            if s.chars().count() > max as usize {
                errors.push(ValidationError::new(
                    &column.name,
                    format!("'{}' exceeds maximum length {}", column.name, max),
                    value.clone(),
                    "max_length",
                ));
                continue;
            }
        }

        if let Some(message) = type_mismatch(column.column_type, &value) {
            errors.push(ValidationError::new(
                &column.name,
                format!("'{}' {}", column.name, message),
                value,
                "type_mismatch",
            ));
        }
    }

    errors
}

fn type_mismatch(column_type: ColumnType, value: &Value) -> Option<String> {
    let ok = match column_type {
        ColumnType::String | ColumnType::Text => value.is_string(),
        ColumnType::Number => value.is_number(),
        ColumnType::Boolean => value.is_boolean(),
        ColumnType::Date => value
            .as_str()
            .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        ColumnType::Uuid => value
            .as_str()
            .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        // Any JSON value is a valid json column; blobs are driver-shaped.
        ColumnType::Json | ColumnType::Blob => true,
    };
    if ok {
        None
    } else {
        Some(format!("is not a valid {:?} value", column_type))
    }
}
