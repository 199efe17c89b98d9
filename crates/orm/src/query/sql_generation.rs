//! Query Builder SQL generation
//!
//! Compiles the accumulated AST into dialect-neutral SQL with 1-based `$n`
//! placeholders. Clauses are omitted entirely when unset; an empty WHERE
//! list emits no WHERE keyword at all.

use serde_json::Value;

use crate::query::builder::{BuiltQuery, QueryBuilder};
use crate::query::condition::Condition;
use crate::query::types::QueryKind;

impl QueryBuilder {
    /// Compile the statement. The parameter list and counter are reset on
    /// every call, so repeated builds of one builder are deterministic.
    pub fn build(&mut self) -> BuiltQuery {
        self.params.clear();
        let sql = match self.kind {
            QueryKind::Select => self.build_select(),
            QueryKind::Insert => self.build_insert(),
            QueryKind::Update => self.build_update(),
            QueryKind::Delete => self.build_delete(),
        };
        BuiltQuery {
            sql,
            params: self.params.clone(),
        }
    }

    fn build_select(&mut self) -> String {
        let mut sql = String::from("SELECT ");

        if self.select_columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_columns.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(alias);
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.join_type.to_string());
            sql.push(' ');
            sql.push_str(&join.table);
            if !join.on.is_empty() {
                sql.push_str(" ON ");
                let pairs: Vec<String> = join
                    .on
                    .iter()
                    .map(|(left, right)| format!("{} = {}", left, right))
                    .collect();
                sql.push_str(&pairs.join(" AND "));
            }
        }

        let mut params = std::mem::take(&mut self.params);
        if let Some(clause) = compile_conditions(&self.where_conditions, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if let Some(clause) = compile_conditions(&self.having_conditions, &mut params) {
            sql.push_str(" HAVING ");
            sql.push_str(&clause);
        }
        self.params = params;

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&clauses.join(", "));
        }

        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset_count {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }

    fn build_insert(&mut self) -> String {
        let mut sql = format!("INSERT INTO {}", self.table);

        if !self.set_clauses.is_empty() {
            let mut params = std::mem::take(&mut self.params);
            let columns: Vec<&str> = self.set_clauses.iter().map(|c| c.column.as_str()).collect();
            let placeholders: Vec<String> = self
                .set_clauses
                .iter()
                .map(|clause| {
                    params.push(clause.value.clone());
                    format!("${}", params.len())
                })
                .collect();
            self.params = params;
            sql.push_str(" (");
            sql.push_str(&columns.join(", "));
            sql.push_str(") VALUES (");
            sql.push_str(&placeholders.join(", "));
            sql.push(')');
        } else {
            sql.push_str(" DEFAULT VALUES");
        }

        if let Some(column) = &self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(column);
        }

        sql
    }

    fn build_update(&mut self) -> String {
        let mut sql = format!("UPDATE {}", self.table);

        if !self.set_clauses.is_empty() {
            sql.push_str(" SET ");
            let mut params = std::mem::take(&mut self.params);
            let assignments: Vec<String> = self
                .set_clauses
                .iter()
                .map(|clause| {
                    params.push(clause.value.clone());
                    format!("{} = ${}", clause.column, params.len())
                })
                .collect();
            self.params = params;
            sql.push_str(&assignments.join(", "));
        }

        let mut params = std::mem::take(&mut self.params);
        if let Some(clause) = compile_conditions(&self.where_conditions, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        self.params = params;

        sql
    }

    fn build_delete(&mut self) -> String {
        let mut sql = format!("DELETE FROM {}", self.table);

        let mut params = std::mem::take(&mut self.params);
        if let Some(clause) = compile_conditions(&self.where_conditions, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        self.params = params;

        sql
    }
}

/// Join top-level clauses with ` AND `; groups parenthesize themselves.
/// Returns `None` when nothing compiles, so callers omit the keyword.
fn compile_conditions(conditions: &[Condition], params: &mut Vec<Value>) -> Option<String> {
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| c.to_sql(params))
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}
