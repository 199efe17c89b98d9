//! Condition tree - the WHERE/HAVING AST and its logical-grammar parser
//!
//! The tree compiles to parameterized SQL fragments; every user-supplied
//! value travels through the parameter list, never through string
//! interpolation.

use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::query::types::CompareOp;

/// A node in the condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Children joined by ` AND `, parenthesized as a unit
    And(Vec<Condition>),
    /// Children joined by ` OR `, parenthesized as a unit
    Or(Vec<Condition>),
    /// Binary comparison against one parameter
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// Membership test; each element becomes its own parameter
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Range test over exactly two parameters
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// Null test; no parameters
    Null { column: String, negated: bool },
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, pattern.into())
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::NotLike, pattern.into())
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Condition::In {
            column: column.into(),
            values,
            negated: false,
        }
    }

    pub fn not_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Condition::In {
            column: column.into(),
            values,
            negated: true,
        }
    }

    pub fn between(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Condition::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        }
    }

    pub fn not_between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Condition::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: true,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Condition::Null {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Condition::Null {
            column: column.into(),
            negated: true,
        }
    }

    pub fn and(children: Vec<Condition>) -> Self {
        Condition::And(children)
    }

    pub fn or(children: Vec<Condition>) -> Self {
        Condition::Or(children)
    }

    /// Parse a top-level condition object into its clause list. Each key
    /// becomes one clause; multiple keys are implicitly ANDed by clause
    /// concatenation, without an enclosing group.
    ///
    /// Grammar: `{col: scalar}` | `{col: {"$op": value}}` |
    /// `{"$and": [tree]}` | `{"$or": [tree]}`.
    pub fn parse_list(tree: &Value) -> OrmResult<Vec<Condition>> {
        let object = match tree {
            Value::Object(map) => map,
            Value::Null => return Ok(Vec::new()),
            other => {
                return Err(OrmError::Query(format!(
                    "condition tree must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut clauses = Vec::with_capacity(object.len());
        for (key, value) in object {
            clauses.push(Self::parse_entry(key, value)?);
        }
        Ok(clauses)
    }

    /// Parse a whole tree into a single node; multiple top-level keys
    /// collapse into an `And` group.
    pub fn from_json(tree: &Value) -> OrmResult<Condition> {
        let mut clauses = Self::parse_list(tree)?;
        match clauses.len() {
            1 => Ok(clauses.remove(0)),
            _ => Ok(Condition::And(clauses)),
        }
    }

    fn parse_entry(key: &str, value: &Value) -> OrmResult<Condition> {
        match key {
            "$and" => Ok(Condition::And(Self::parse_group(key, value)?)),
            "$or" => Ok(Condition::Or(Self::parse_group(key, value)?)),
            _ if key.starts_with('$') => Err(OrmError::Query(format!(
                "unknown logical operator '{}'",
                key
            ))),
            column => match value {
                Value::Object(ops) => {
                    let mut leaves = Vec::with_capacity(ops.len());
                    for (op, operand) in ops {
                        leaves.push(Self::parse_operator(column, op, operand)?);
                    }
                    if leaves.len() == 1 {
                        Ok(leaves.remove(0))
                    } else {
                        Ok(Condition::And(leaves))
                    }
                }
                scalar => Ok(Condition::eq(column, scalar.clone())),
            },
        }
    }

    fn parse_group(key: &str, value: &Value) -> OrmResult<Vec<Condition>> {
        let items = value.as_array().ok_or_else(|| {
            OrmError::Query(format!("'{}' expects an array of condition trees", key))
        })?;
        items.iter().map(Self::from_json).collect()
    }

    fn parse_operator(column: &str, op: &str, operand: &Value) -> OrmResult<Condition> {
        let compare = |op| Ok(Condition::compare(column, op, operand.clone()));
        match op {
            "$eq" => compare(CompareOp::Eq),
            "$ne" => compare(CompareOp::Ne),
            "$gt" => compare(CompareOp::Gt),
            "$gte" => compare(CompareOp::Gte),
            "$lt" => compare(CompareOp::Lt),
            "$lte" => compare(CompareOp::Lte),
            "$like" => compare(CompareOp::Like),
            "$notLike" => compare(CompareOp::NotLike),
            "$in" | "$notIn" => {
                let values = operand
                    .as_array()
                    .ok_or_else(|| {
                        OrmError::Query(format!("'{}' on '{}' expects an array", op, column))
                    })?
                    .clone();
                Ok(Condition::In {
                    column: column.to_string(),
                    values,
                    negated: op == "$notIn",
                })
            }
            "$between" | "$notBetween" => {
                let bounds = operand.as_array().filter(|a| a.len() == 2).ok_or_else(|| {
                    OrmError::Query(format!(
                        "'{}' on '{}' expects a two-element array",
                        op, column
                    ))
                })?;
                Ok(Condition::Between {
                    column: column.to_string(),
                    low: bounds[0].clone(),
                    high: bounds[1].clone(),
                    negated: op == "$notBetween",
                })
            }
            "$isNull" => Ok(Condition::is_null(column)),
            "$isNotNull" => Ok(Condition::is_not_null(column)),
            other => Err(OrmError::Query(format!(
                "unknown operator '{}' on column '{}'",
                other, column
            ))),
        }
    }

    /// Compile this node to a SQL fragment, pushing parameters onto `params`.
    /// Placeholders are 1-based `$n` in the dialect-neutral form.
    pub(crate) fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Condition::And(children) => group_sql(children, " AND ", params),
            Condition::Or(children) => group_sql(children, " OR ", params),
            Condition::Compare { column, op, value } => {
                params.push(value.clone());
                format!("{} {} ${}", column, op, params.len())
            }
            Condition::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // An empty membership list can never match (or always
                    // matches, when negated); a constant predicate keeps the
                    // emitted SQL valid.
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|value| {
                        params.push(value.clone());
                        format!("${}", params.len())
                    })
                    .collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column, keyword, placeholders.join(", "))
            }
            Condition::Between {
                column,
                low,
                high,
                negated,
            } => {
                params.push(low.clone());
                let low_slot = params.len();
                params.push(high.clone());
                let high_slot = params.len();
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} ${} AND ${}", column, keyword, low_slot, high_slot)
            }
            Condition::Null { column, negated } => {
                if *negated {
                    format!("{} IS NOT NULL", column)
                } else {
                    format!("{} IS NULL", column)
                }
            }
        }
    }
}

fn group_sql(children: &[Condition], joiner: &str, params: &mut Vec<Value>) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|c| c.to_sql(params))
        .filter(|s| !s.is_empty())
        .collect();
    match parts.len() {
        0 => String::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(joiner)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(condition: &Condition) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = condition.to_sql(&mut params);
        (sql, params)
    }

    #[test]
    fn scalar_is_equality() {
        let parsed = Condition::from_json(&json!({"name": "ada"})).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "name = $1");
        assert_eq!(params, vec![json!("ada")]);
    }

    #[test]
    fn operator_map_parses_each_operator() {
        let parsed = Condition::from_json(&json!({"age": {"$gt": 18}})).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "age > $1");
        assert_eq!(params, vec![json!(18)]);
    }

    #[test]
    fn nested_and_or_composition() {
        let tree = json!({"$and": [{"a": 1}, {"$or": [{"b": 2}, {"c": 3}]}]});
        let parsed = Condition::from_json(&tree).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "(a = $1 AND (b = $2 OR c = $3))");
        assert_eq!(params, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn in_expands_each_element() {
        let parsed = Condition::from_json(&json!({"id": {"$in": [1, 2, 3]}})).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "id IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_compiles_to_constant_predicate() {
        let (sql, params) = compile(&Condition::is_in("id", vec![]));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());

        let (sql, params) = compile(&Condition::not_in("id", vec![]));
        assert_eq!(sql, "1 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn between_takes_two_parameters() {
        let parsed = Condition::from_json(&json!({"age": {"$between": [18, 65]}})).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "age BETWEEN $1 AND $2");
        assert_eq!(params, vec![json!(18), json!(65)]);

        let bad = Condition::from_json(&json!({"age": {"$between": [18]}}));
        assert!(bad.is_err());
    }

    #[test]
    fn null_tests_take_no_parameters() {
        let parsed = Condition::from_json(&json!({"deleted_at": {"$isNull": true}})).unwrap();
        let (sql, params) = compile(&parsed);
        assert_eq!(sql, "deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn multiple_top_level_keys_become_separate_clauses() {
        let clauses = Condition::parse_list(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn empty_tree_produces_no_clauses() {
        assert!(Condition::parse_list(&json!({})).unwrap().is_empty());
        assert!(Condition::parse_list(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert!(Condition::from_json(&json!({"a": {"$regex": "x"}})).is_err());
        assert!(Condition::from_json(&json!({"$xor": []})).is_err());
    }
}
