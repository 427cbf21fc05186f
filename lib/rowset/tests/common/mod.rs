#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

//! In-memory executor for exercising the controller without a server.
//!
//! Tables are JSON row lists behind one mutex; transactions work on a
//! copy of the whole map and swap it in on commit, so rollback is "drop
//! the copy" - the same observable contract as a real backend. Failure
//! injection covers the interesting points of the replace loop. Column
//! names are assumed to equal serde keys (true for every test record).

use async_trait::async_trait;
use rowset::{
    Delete, Filter, Order, Query, QueryExecutor, Raw, Record, StoreError, TransactionExecutor,
    Value,
};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct Table {
    pub rows: Vec<JsonValue>,
    pub next_id: i64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

/// Points at which the store can be made to fail.
#[derive(Clone, Copy, Default)]
pub struct Failures {
    /// Fail the transactional truncate.
    pub truncate: bool,
    /// Fail the nth (0-based) insert inside a transaction.
    pub insert_at: Option<usize>,
    /// Fail the commit itself.
    pub commit: bool,
    /// Make explicit-id inserts report zero affected rows.
    pub zero_affected_inserts: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, Table>>>,
    failures: Arc<Mutex<Failures>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failures(&self, failures: Failures) {
        *self.failures.lock().unwrap() = failures;
    }

    /// Direct view of a table's committed rows, bypassing the executor.
    pub fn raw_rows(&self, table: &str) -> Vec<JsonValue> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Committed rows decoded as records.
    pub fn rows_as<T: Record>(&self, table: &str) -> Vec<T> {
        self.raw_rows(table)
            .into_iter()
            .map(|row| serde_json::from_value(row).unwrap())
            .collect()
    }

    /// Seed a table with committed rows (ids must already be set).
    pub fn seed<T: Record>(&self, table: &str, rows: &[T]) {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        for row in rows {
            t.rows.push(serde_json::to_value(row).unwrap());
            t.next_id = t.next_id.max(row.id() + 1);
        }
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::String(s) => json!(s),
        Value::Int(i) => json!(i),
        Value::UInt(u) => json!(u),
        Value::Float(f) => json!(f),
        Value::Bool(b) => json!(b),
        Value::Null => JsonValue::Null,
    }
}

fn matches(row: &JsonValue, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => row.get(column) == Some(&value_to_json(value)),
        Filter::IsNull(column) => row.get(column).is_none_or(JsonValue::is_null),
        Filter::IsNotNull(column) => row.get(column).is_some_and(|v| !v.is_null()),
        other => panic!("memory store does not model filter {other:?}"),
    })
}

fn record_to_row<T: Record>(item: &T, id: i64) -> Result<JsonValue, StoreError> {
    let mut obj = serde_json::to_value(item)?
        .as_object()
        .cloned()
        .ok_or_else(|| StoreError::Config("record must serialize to an object".into()))?;
    obj.insert(T::id_json_key().to_string(), json!(id));
    Ok(JsonValue::Object(obj))
}

fn apply_query<T: Record>(table: &Table, query: &Query<T>) -> Result<Vec<T>, StoreError> {
    let mut rows: Vec<JsonValue> = table
        .rows
        .iter()
        .filter(|row| matches(row, &query.filters))
        .cloned()
        .collect();

    for (column, order) in query.order_by.iter().rev() {
        rows.sort_by_key(|row| row.get(column).and_then(JsonValue::as_i64).unwrap_or(0));
        if matches!(order, Order::Desc) {
            rows.reverse();
        }
    }

    let offset = query.offset.unwrap_or(0) as usize;
    let rows = rows.into_iter().skip(offset);
    let rows: Vec<JsonValue> = match query.limit {
        Some(limit) => rows.take(limit as usize).collect(),
        None => rows.collect(),
    };

    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::Serialization))
        .collect()
}

#[async_trait]
impl QueryExecutor for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn fetch<T: Record>(&self, query: Query<T>) -> Result<Vec<T>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let table = tables.get(&query.table).cloned().unwrap_or_default();
        apply_query(&table, &query)
    }

    async fn fetch_optional<T: Record>(&self, query: Query<T>) -> Result<Option<T>, StoreError> {
        let mut q = query;
        q.limit = Some(1);
        Ok(self.fetch(q).await?.into_iter().next())
    }

    async fn count(&self, table: &str, column: Option<&str>) -> Result<i64, StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[]);
        let count = match column {
            Some(col) => rows
                .iter()
                .filter(|row| row.get(col).is_some_and(|v| !v.is_null()))
                .count(),
            None => rows.len(),
        };
        Ok(count as i64)
    }

    async fn max_id(&self, table: &str, id_column: &str) -> Result<Option<i64>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.get(table).and_then(|t| {
            t.rows
                .iter()
                .filter_map(|row| row.get(id_column).and_then(JsonValue::as_i64))
                .max()
        }))
    }

    async fn insert<T: Record>(&self, item: &T, table: &str) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        let id = t.next_id;
        t.next_id += 1;
        let row = record_to_row(item, id)?;
        t.rows.push(row);
        Ok(id)
    }

    async fn insert_with_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError> {
        if self.failures.lock().unwrap().zero_affected_inserts {
            return Ok(0);
        }
        let mut tables = self.tables.lock().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        insert_explicit(t, item)
    }

    async fn update_by_id<T: Record>(&self, item: &T, table: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.entry(table.to_string()).or_default();
        let key = T::id_json_key();
        let target = json!(item.id());
        for row in &mut t.rows {
            if row.get(key) == Some(&target) {
                *row = record_to_row(item, item.id())?;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete<T: Record>(&self, delete: Delete<T>) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let t = tables.entry(delete.table.clone()).or_default();
        let before = t.rows.len();
        t.rows.retain(|row| !matches(row, &delete.filters));
        Ok((before - t.rows.len()) as u64)
    }

    async fn truncate(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default().rows.clear();
        Ok(())
    }

    async fn execute(&self, _statement: Raw) -> Result<u64, StoreError> {
        Err(StoreError::query("execute", "not modeled by the memory store"))
    }

    async fn fetch_rows<T: Record>(&self, _statement: Raw) -> Result<Vec<T>, StoreError> {
        Err(StoreError::query("fetch_rows", "not modeled by the memory store"))
    }

    async fn fetch_column(&self, _statement: Raw, _column: &str) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::query("fetch_column", "not modeled by the memory store"))
    }

    async fn begin_transaction(&self) -> Result<Self::Transaction, StoreError> {
        let work = self.tables.lock().unwrap().clone();
        Ok(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            failures: Arc::clone(&self.failures),
            work,
            inserts_done: 0,
        })
    }
}

/// Transaction over a private copy of the store; commit swaps it in.
pub struct MemoryTransaction {
    tables: Arc<Mutex<HashMap<String, Table>>>,
    failures: Arc<Mutex<Failures>>,
    work: HashMap<String, Table>,
    inserts_done: usize,
}

fn insert_explicit<T: Record>(t: &mut Table, item: &T) -> Result<u64, StoreError> {
    let key = T::id_json_key();
    let target = json!(item.id());
    if t.rows.iter().any(|row| row.get(key) == Some(&target)) {
        return Err(StoreError::query(
            "insert_with_id",
            format!("UNIQUE constraint failed: {}.{key}", T::table_name()),
        ));
    }
    t.rows.push(record_to_row(item, item.id())?);
    t.next_id = t.next_id.max(item.id() + 1);
    Ok(1)
}

impl MemoryTransaction {
    fn check_insert_failure(&mut self) -> Result<(), StoreError> {
        let failures = *self.failures.lock().unwrap();
        if failures.insert_at == Some(self.inserts_done) {
            return Err(StoreError::query(
                "insert",
                format!("injected failure at insert {}", self.inserts_done),
            ));
        }
        self.inserts_done += 1;
        Ok(())
    }
}

#[async_trait]
impl TransactionExecutor for MemoryTransaction {
    async fn truncate(&mut self, table: &str) -> Result<(), StoreError> {
        if self.failures.lock().unwrap().truncate {
            return Err(StoreError::query("truncate", "injected truncate failure"));
        }
        self.work.entry(table.to_string()).or_default().rows.clear();
        Ok(())
    }

    async fn insert<T: Record>(&mut self, item: &T, table: &str) -> Result<i64, StoreError> {
        self.check_insert_failure()?;
        let t = self.work.entry(table.to_string()).or_default();
        let id = t.next_id;
        t.next_id += 1;
        let row = record_to_row(item, id)?;
        t.rows.push(row);
        Ok(id)
    }

    async fn insert_with_id<T: Record>(
        &mut self,
        item: &T,
        table: &str,
    ) -> Result<u64, StoreError> {
        self.check_insert_failure()?;
        if self.failures.lock().unwrap().zero_affected_inserts {
            return Ok(0);
        }
        let t = self.work.entry(table.to_string()).or_default();
        insert_explicit(t, item)
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.failures.lock().unwrap().commit {
            return Err(StoreError::query("commit", "injected commit failure"));
        }
        *self.tables.lock().unwrap() = self.work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // The working copy just gets dropped.
        Ok(())
    }
}
