//! SQLite implementation of QueryExecutor.

use async_trait::async_trait;
use rowset::{
    ConnectionConfig, Delete, Query, QueryExecutor, Raw, Record, StoreConnection, StoreError,
    TransactionExecutor, Value,
};
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::ops::Deref;

use crate::statement;

/// Wrapper around sqlx::SqlitePool that implements QueryExecutor.
///
/// The pool holds a single long-lived connection: SQLite serializes
/// writers anyway, and a lone connection keeps `sqlite::memory:`
/// databases alive and visible across calls. Operations queued behind an
/// open transaction wait for it to finish.
#[derive(Clone, Debug)]
pub struct SqlitePool(sqlx::SqlitePool);

impl SqlitePool {
    /// Create a new SqlitePool from an sqlx SqlitePool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self(pool)
    }

    /// Connect to a SQLite database (`sqlite::memory:` or `sqlite://path`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(|e| StoreError::query("connect", e))?;
        Ok(Self(pool))
    }

    /// Get the inner sqlx::SqlitePool.
    pub fn inner(&self) -> &sqlx::SqlitePool {
        &self.0
    }
}

impl Deref for SqlitePool {
    type Target = sqlx::SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl StoreConnection for SqlitePool {
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, StoreError> {
        let ConnectionConfig::Url(url) = config.into();
        Self::connect(&url).await
    }
}

fn bind_params<'q>(params: &[Value]) -> Result<SqliteArguments<'q>, StoreError> {
    let mut args = SqliteArguments::default();
    for value in params {
        statement::bind_value(&mut args, value)?;
    }
    Ok(args)
}

#[async_trait]
impl QueryExecutor for SqlitePool {
    type Transaction = SqliteTransaction;

    async fn fetch<T: Record>(&self, query: Query<T>) -> Result<Vec<T>, StoreError> {
        let op = "fetch";
        let where_clause = statement::build_where_clause(&query.filters);
        let order_clause = statement::build_order_clause(&query.order_by);

        let mut sql = format!("SELECT * FROM {}{}{}", query.table, where_clause, order_clause);
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        } else if query.offset.is_some() {
            // SQLite requires a LIMIT before OFFSET
            sql.push_str(" LIMIT -1");
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut args = SqliteArguments::default();
        statement::bind_filters(&mut args, &query.filters)?;

        let rows = sqlx::query_with(&sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(|e| StoreError::query(op, e))?;

        rows.iter().map(|row| statement::deserialize_row::<T>(row)).collect()
    }

    async fn fetch_optional<T: Record>(&self, query: Query<T>) -> Result<Option<T>, StoreError> {
        let mut q = query;
        q.limit = Some(1);

        let results = self.fetch(q).await?;
        Ok(results.into_iter().next())
    }

    async fn count(&self, table: &str, column: Option<&str>) -> Result<i64, StoreError> {
        let op = "count";
        let sql = match column {
            Some(col) => format!("SELECT COUNT({col}) FROM {table}"),
            None => format!("SELECT COUNT(*) FROM {table}"),
        };
        let row = sqlx::query(&sql)
            .fetch_one(&self.0)
            .await
            .map_err(|e| StoreError::query(op, e))?;
        row.try_get::<i64, _>(0).map_err(|e| StoreError::query(op, e))
    }

    async fn max_id(&self, table: &str, id_column: &str) -> Result<Option<i64>, StoreError> {
        let op = "max_id";
        let sql = format!("SELECT MAX({id_column}) FROM {table}");
        let row = sqlx::query(&sql)
            .fetch_one(&self.0)
            .await
            .map_err(|e| StoreError::query(op, e))?;
        row.try_get::<Option<i64>, _>(0)
            .map_err(|e| StoreError::query(op, e))
    }

    async fn insert<T: Record>(&self, item: &T, table: &str) -> Result<i64, StoreError> {
        let sql = statement::insert_sql(table, T::columns());
        let args = statement::bind_record(item, false)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("insert", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_with_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError> {
        let sql = statement::insert_sql_with_id(table, T::id_column(), T::columns());
        let args = statement::bind_record(item, true)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("insert_with_id", e))?;
        Ok(result.rows_affected())
    }

    async fn update_by_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError> {
        let sql = statement::update_by_id_sql(table, T::id_column(), T::columns());
        let mut args = statement::bind_record(item, false)?;
        statement::bind_value(&mut args, &Value::Int(item.id()))?;
        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("update_by_id", e))?;
        Ok(result.rows_affected())
    }

    async fn delete<T: Record>(&self, delete: Delete<T>) -> Result<u64, StoreError> {
        let where_clause = statement::build_where_clause(&delete.filters);
        let sql = format!("DELETE FROM {}{}", delete.table, where_clause);

        let mut args = SqliteArguments::default();
        statement::bind_filters(&mut args, &delete.filters)?;

        let result = sqlx::query_with(&sql, args)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("delete", e))?;

        Ok(result.rows_affected())
    }

    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        // SQLite's whole-table clear
        let sql = format!("DELETE FROM {table}");
        sqlx::query(&sql)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("truncate", e))?;
        Ok(())
    }

    async fn execute(&self, statement: Raw) -> Result<u64, StoreError> {
        let args = bind_params(&statement.params)?;
        let result = sqlx::query_with(&statement.sql, args)
            .execute(&self.0)
            .await
            .map_err(|e| StoreError::query("execute", e))?;
        Ok(result.rows_affected())
    }

    async fn fetch_rows<T: Record>(&self, statement: Raw) -> Result<Vec<T>, StoreError> {
        let args = bind_params(&statement.params)?;
        let rows = sqlx::query_with(&statement.sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(|e| StoreError::query("fetch_rows", e))?;
        rows.iter().map(|row| statement::deserialize_row::<T>(row)).collect()
    }

    async fn fetch_column(&self, statement: Raw, column: &str) -> Result<Vec<Value>, StoreError> {
        let args = bind_params(&statement.params)?;
        let rows = sqlx::query_with(&statement.sql, args)
            .fetch_all(&self.0)
            .await
            .map_err(|e| StoreError::query("fetch_column", e))?;
        rows.iter()
            .map(|row| {
                statement::extract_column_value(row, column).map(|json| Value::from_json(&json))
            })
            .collect()
    }

    async fn begin_transaction(&self) -> Result<Self::Transaction, StoreError> {
        let tx = self
            .0
            .begin()
            .await
            .map_err(|e| StoreError::query("begin_transaction", e))?;
        Ok(SqliteTransaction { tx })
    }
}

/// SQLite transaction wrapper implementing TransactionExecutor.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl TransactionExecutor for SqliteTransaction {
    async fn truncate(&mut self, table: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {table}");
        sqlx::query(&sql)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::query("truncate", e))?;
        Ok(())
    }

    async fn insert<T: Record>(&mut self, item: &T, table: &str) -> Result<i64, StoreError> {
        let sql = statement::insert_sql(table, T::columns());
        let args = statement::bind_record(item, false)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::query("insert", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_with_id<T: Record>(
        &mut self,
        item: &T,
        table: &str,
    ) -> Result<u64, StoreError> {
        let sql = statement::insert_sql_with_id(table, T::id_column(), T::columns());
        let args = statement::bind_record(item, true)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::query("insert_with_id", e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::query("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::query("rollback", e))
    }
}
