//! Query Builder - fluent AST construction
//!
//! Mutators consume and return the builder for chaining. `build()` resets
//! the parameter context before compiling, so a builder can be compiled
//! more than once and always yields the same statement.

use serde_json::Value;

use crate::query::condition::Condition;
use crate::query::types::{JoinClause, JoinType, OrderDirection, QueryKind, SetClause};

/// A compiled statement: dialect-neutral SQL plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builder for SELECT/INSERT/UPDATE/DELETE statements
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) kind: QueryKind,
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    pub(crate) select_columns: Vec<String>,
    pub(crate) where_conditions: Vec<Condition>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having_conditions: Vec<Condition>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_count: Option<i64>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) returning: Option<String>,
    pub(crate) params: Vec<Value>,
}

impl QueryBuilder {
    /// Start a SELECT builder for `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Select,
            table: table.into(),
            alias: None,
            select_columns: Vec::new(),
            where_conditions: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            having_conditions: Vec::new(),
            limit_count: None,
            offset_count: None,
            set_clauses: Vec::new(),
            returning: None,
            params: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Restrict the selected columns; the default is `*`
    pub fn select(mut self, columns: Vec<String>) -> Self {
        self.select_columns = columns;
        self
    }

    /// Add a WHERE clause. Top-level clauses are joined by ` AND `.
    pub fn where_cond(mut self, condition: Condition) -> Self {
        self.where_conditions.push(condition);
        self
    }

    /// Alias of [`where_cond`](Self::where_cond), for chained reading
    pub fn and_where(self, condition: Condition) -> Self {
        self.where_cond(condition)
    }

    /// OR the given condition against the most recent clause. With no
    /// prior clause this is a plain WHERE.
    pub fn or_where(mut self, condition: Condition) -> Self {
        match self.where_conditions.pop() {
            Some(previous) => self
                .where_conditions
                .push(Condition::or(vec![previous, condition])),
            None => self.where_conditions.push(condition),
        }
        self
    }

    pub fn join(mut self, table: impl Into<String>, on: Vec<(String, String)>) -> Self {
        self.joins.push(JoinClause {
            join_type: JoinType::Inner,
            table: table.into(),
            on,
        });
        self
    }

    pub fn left_join(mut self, table: impl Into<String>, on: Vec<(String, String)>) -> Self {
        self.joins.push(JoinClause {
            join_type: JoinType::Left,
            table: table.into(),
            on,
        });
        self
    }

    pub fn right_join(mut self, table: impl Into<String>, on: Vec<(String, String)>) -> Self {
        self.joins.push(JoinClause {
            join_type: JoinType::Right,
            table: table.into(),
            on,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn group_by(mut self, columns: Vec<String>) -> Self {
        self.group_by = columns;
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having_conditions.push(condition);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit_count = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset_count = Some(offset);
        self
    }

    /// Turn the builder into an INSERT. Column order follows the given
    /// pairs; values become positional parameters in the same order.
    pub fn insert_values(mut self, values: Vec<(String, Value)>) -> Self {
        self.kind = QueryKind::Insert;
        self.set_clauses = values
            .into_iter()
            .map(|(column, value)| SetClause { column, value })
            .collect();
        self
    }

    /// Turn the builder into an UPDATE with SET pairs in insertion order
    pub fn update_set(mut self, values: Vec<(String, Value)>) -> Self {
        self.kind = QueryKind::Update;
        self.set_clauses = values
            .into_iter()
            .map(|(column, value)| SetClause { column, value })
            .collect();
        self
    }

    /// Turn the builder into a DELETE
    pub fn delete(mut self) -> Self {
        self.kind = QueryKind::Delete;
        self
    }

    /// Append a RETURNING clause (dialects that cannot execute it surface
    /// generated keys through the driver instead)
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }
}
