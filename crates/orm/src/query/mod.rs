//! Query Builder - fluent construction and compilation of SQL statements

pub mod builder;
pub mod condition;
pub mod sql_generation;
pub mod types;

pub use builder::{BuiltQuery, QueryBuilder};
pub use condition::Condition;
pub use types::{CompareOp, JoinClause, JoinType, OrderDirection, QueryKind, SetClause};
