//! Query Builder Types - enums and clause structs shared by the builder

use std::fmt;

use serde_json::Value;

/// Statement kinds the builder compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Like => write!(f, "LIKE"),
            CompareOp::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// One join clause: table plus equality pairs for the ON condition
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub on: Vec<(String, String)>,
}

/// Ordering direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl OrderDirection {
    /// Parse the textual form used by the logical options surface
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

/// One column/value pair for INSERT and UPDATE statements. Order of
/// insertion is preserved through compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_sql_rendering() {
        assert_eq!(CompareOp::Eq.to_string(), "=");
        assert_eq!(CompareOp::Gte.to_string(), ">=");
        assert_eq!(CompareOp::NotLike.to_string(), "NOT LIKE");
    }

    #[test]
    fn order_direction_parse_is_lenient() {
        assert_eq!(OrderDirection::parse("DESC"), OrderDirection::Desc);
        assert_eq!(OrderDirection::parse("desc"), OrderDirection::Desc);
        assert_eq!(OrderDirection::parse("anything"), OrderDirection::Asc);
    }
}
