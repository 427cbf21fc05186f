//! Database-agnostic query and statement model.
//!
//! This module provides the query abstraction translated by each backend
//! (PostgreSQL, SQLite) into its own SQL dialect, plus the executor traits
//! the backends implement.

use crate::{Record, StoreError};
use async_trait::async_trait;
use std::marker::PhantomData;

/// A value that can be bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value {
    /// Translate a JSON scalar into a bindable value.
    ///
    /// Backends extract raw-query columns into JSON first; this is the
    /// common mapping back onto the parameter model.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    /// The contained integer, when the value is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// The contained string, when the value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Filter conditions for queries.
#[derive(Debug, Clone)]
pub enum Filter {
    /// column = value
    Eq(String, Value),
    /// column != value
    Ne(String, Value),
    /// column > value
    Gt(String, Value),
    /// column >= value
    Gte(String, Value),
    /// column < value
    Lt(String, Value),
    /// column <= value
    Lte(String, Value),
    /// column IS NULL
    IsNull(String),
    /// column IS NOT NULL
    IsNotNull(String),
}

/// Sort order.
#[derive(Debug, Clone, Copy)]
pub enum Order {
    Asc,
    Desc,
}

/// A SELECT query builder.
#[derive(Debug, Clone)]
pub struct Query<T> {
    /// The table to query.
    pub table: String,
    /// Filter conditions.
    pub filters: Vec<Filter>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Offset for pagination.
    pub offset: Option<u64>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T: Record> Query<T> {
    /// Create a new query for the type's table.
    pub fn new() -> Self {
        Self::for_table(T::table_name())
    }

    /// Create a new query with an explicit table name.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _marker: PhantomData,
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand for Filter::Eq).
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.into(), value.into()))
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset for pagination.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl<T: Record> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A DELETE query builder.
#[derive(Debug, Clone)]
pub struct Delete<T> {
    /// The table to delete from.
    pub table: String,
    /// Filter conditions.
    pub filters: Vec<Filter>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T: Record> Delete<T> {
    /// Create a new delete query for the type's table.
    pub fn new() -> Self {
        Self::for_table(T::table_name())
    }

    /// Create a new delete query with an explicit table name.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand).
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.into(), value.into()))
    }
}

impl<T: Record> Default for Delete<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw SQL statement with positional parameters.
///
/// Placeholder syntax is the backend's (`$1`/`$2` on PostgreSQL, `?` on
/// SQLite); parameters bind in the order given. Parameterization is the
/// only injection protection — SQL correctness is the caller's problem.
#[derive(Debug, Clone)]
pub struct Raw {
    /// The SQL text.
    pub sql: String,
    /// Positional parameters, bound in order.
    pub params: Vec<Value>,
}

impl Raw {
    /// A statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with the given positional parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append one positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Trait for executing statements against a database backend.
///
/// Implemented by database-specific pool types. All table-level
/// operations take the table name explicitly because a controller may be
/// bound to a table other than the record type's default.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// The transaction type for this executor.
    type Transaction: TransactionExecutor;

    /// Execute a SELECT query and return results.
    async fn fetch<T: Record>(&self, query: Query<T>) -> Result<Vec<T>, StoreError>;

    /// Execute a SELECT query and return at most one result.
    async fn fetch_optional<T: Record>(&self, query: Query<T>) -> Result<Option<T>, StoreError>;

    /// `COUNT(*)`, or `COUNT(column)` when a column is given.
    async fn count(&self, table: &str, column: Option<&str>) -> Result<i64, StoreError>;

    /// Largest value of the identity column; `None` on an empty table.
    async fn max_id(&self, table: &str, id_column: &str) -> Result<Option<i64>, StoreError>;

    /// Insert without an explicit id; returns the server-assigned identity.
    async fn insert<T: Record>(&self, item: &T, table: &str) -> Result<i64, StoreError>;

    /// Insert including the id column; returns the number of rows affected.
    async fn insert_with_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError>;

    /// Update the row matching the item's id; returns rows affected.
    async fn update_by_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError>;

    /// Execute a DELETE query and return the number of rows affected.
    async fn delete<T: Record>(&self, delete: Delete<T>) -> Result<u64, StoreError>;

    /// Remove every row from the table, in the backend's truncate form.
    async fn truncate(&self, table: &str) -> Result<(), StoreError>;

    /// Execute a raw statement; returns rows affected.
    async fn execute(&self, statement: Raw) -> Result<u64, StoreError>;

    /// Run a raw SELECT and materialize each row as a record.
    async fn fetch_rows<T: Record>(&self, statement: Raw) -> Result<Vec<T>, StoreError>;

    /// Run a raw SELECT and return one named column's values.
    async fn fetch_column(&self, statement: Raw, column: &str) -> Result<Vec<Value>, StoreError>;

    /// Begin a transaction. The returned executor runs statements inside it.
    async fn begin_transaction(&self) -> Result<Self::Transaction, StoreError>;
}

/// Trait for executing statements within a transaction.
///
/// Only the operations the whole-table replace needs run transactionally;
/// everything else autocommits through [`QueryExecutor`].
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Remove every row from the table, inside the transaction.
    async fn truncate(&mut self, table: &str) -> Result<(), StoreError>;

    /// Insert without an explicit id; returns the server-assigned identity.
    async fn insert<T: Record>(&mut self, item: &T, table: &str) -> Result<i64, StoreError>;

    /// Insert including the id column; returns rows affected.
    async fn insert_with_id<T: Record>(&mut self, item: &T, table: &str)
    -> Result<u64, StoreError>;

    /// Commit the transaction.
    async fn commit(self) -> Result<(), StoreError>;

    /// Rollback the transaction.
    async fn rollback(self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Default)]
    struct Row {
        id: i64,
        name: String,
    }

    impl Record for Row {
        fn table_name() -> &'static str {
            "rows"
        }
        fn columns() -> &'static [&'static str] {
            &["name"]
        }
        fn column_types() -> &'static [&'static str] {
            &["text"]
        }
        fn json_keys() -> &'static [&'static str] {
            &["name"]
        }
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    #[test]
    fn query_builder_accumulates_clauses() {
        let query = Query::<Row>::new()
            .eq("name", "a")
            .order_by("id", Order::Asc)
            .limit(10)
            .offset(20);
        assert_eq!(query.table, "rows");
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.order_by.len(), 1);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(20));
    }

    #[test]
    fn for_table_overrides_default() {
        let delete = Delete::<Row>::for_table("archive").eq("id", 3i64);
        assert_eq!(delete.table, "archive");
        assert_eq!(delete.filters.len(), 1);
    }

    #[test]
    fn raw_binds_in_order() {
        let raw = Raw::new("select * from rows where name = ? and id > ?")
            .bind("a")
            .bind(5i64);
        assert_eq!(raw.params.len(), 2);
        assert_eq!(raw.params[0], Value::String("a".into()));
        assert_eq!(raw.params[1], Value::Int(5));
    }

    #[test]
    fn json_scalars_map_onto_values() {
        assert_eq!(Value::from_json(&serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from_json(&serde_json::json!("x")), Value::String("x".into()));
        assert_eq!(Value::from_json(&serde_json::Value::Null), Value::Null);
        assert_eq!(Value::from_json(&serde_json::json!(true)), Value::Bool(true));
    }
}
