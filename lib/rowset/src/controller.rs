//! The generic table controller.
//!
//! A [`TableController`] binds one database table to an in-process cache
//! of rows and drives every remote operation through a shared
//! [`QueryExecutor`]. Remote operations that also touch the cache take a
//! `sync_cache` flag; the cache is only ever mutated after the remote
//! side has confirmed the operation.

use crate::{Delete, Query, QueryExecutor, Raw, Record, StoreError, TransactionExecutor, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Generic controller for one table of `T` rows.
///
/// The cache (`data`) mirrors a possibly stale view of the table. It is
/// guarded by a single mutex; every read and write goes through it, and
/// the lock is never held across an await point. Callers sharing one
/// controller get torn-read-free cache access, but nothing here serializes
/// remote operations against each other — interleaved calls from two
/// tasks may race on the table itself, as with any autocommit SQL.
pub struct TableController<T, E> {
    executor: Arc<E>,
    table: String,
    data: Mutex<Vec<T>>,
}

impl<T: Record, E: QueryExecutor> TableController<T, E> {
    /// Controller over the record type's default table.
    pub fn new(executor: Arc<E>) -> Self {
        Self::for_table(executor, T::table_name())
    }

    /// Controller over an explicit table name.
    pub fn for_table(executor: Arc<E>, table: impl Into<String>) -> Self {
        Self {
            executor,
            table: table.into(),
            data: Mutex::new(Vec::new()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // A panicked holder can only have been mid-read or mid-swap of the
        // Vec, both of which leave it structurally intact.
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- cache-side accessors (no I/O) ---

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone of the row at `index`, if any.
    pub fn get(&self, index: usize) -> Option<T> {
        self.lock().get(index).cloned()
    }

    /// Overwrite the row at `index`; false when out of bounds.
    pub fn set(&self, index: usize, record: T) -> bool {
        let mut data = self.lock();
        match data.get_mut(index) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the whole cache.
    pub fn records(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Replace the whole cache.
    pub fn set_records(&self, records: Vec<T>) {
        *self.lock() = records;
    }

    /// Cache position of the row with the given id.
    pub fn position_by_id(&self, id: i64) -> Option<usize> {
        self.lock().iter().position(|r| r.id() == id)
    }

    /// Clone of the cached row with the given id.
    pub fn cached_by_id(&self, id: i64) -> Option<T> {
        self.lock().iter().find(|r| r.id() == id).cloned()
    }

    /// Replace the cached row whose id matches `record`; false when no
    /// row matches.
    pub fn replace_cached(&self, record: T) -> bool {
        let mut data = self.lock();
        match data.iter().position(|r| r.id() == record.id()) {
            Some(index) => {
                data[index] = record;
                true
            }
            None => false,
        }
    }

    /// Remove every cached row with the given id; true iff exactly one
    /// row was removed.
    pub fn remove_cached(&self, id: i64) -> bool {
        let mut data = self.lock();
        let before = data.len();
        data.retain(|r| r.id() != id);
        before - data.len() == 1
    }

    pub fn clear_cached(&self) {
        self.lock().clear();
    }

    // --- remote CRUD ---

    /// Row count; with `only_non_null_ids`, counts the identity column
    /// instead of `*`.
    pub async fn count(&self, only_non_null_ids: bool) -> Result<i64, StoreError> {
        let column = only_non_null_ids.then(T::id_column);
        self.executor.count(&self.table, column).await
    }

    /// Every row in the table; replaces the cache when `sync_cache`.
    pub async fn select_all(&self, sync_cache: bool) -> Result<Vec<T>, StoreError> {
        let rows = self.executor.fetch(Query::<T>::for_table(&self.table)).await?;
        if sync_cache {
            self.set_records(rows.clone());
        }
        Ok(rows)
    }

    /// One page of rows ordered by id; replaces the cache when
    /// `sync_cache`.
    pub async fn select_page(
        &self,
        offset: u64,
        limit: u64,
        sync_cache: bool,
    ) -> Result<Vec<T>, StoreError> {
        let query = Query::<T>::for_table(&self.table)
            .order_by(T::id_column(), crate::Order::Asc)
            .offset(offset)
            .limit(limit);
        let rows = self.executor.fetch(query).await?;
        if sync_cache {
            self.set_records(rows.clone());
        }
        Ok(rows)
    }

    /// The row with the given id; absence is not an error.
    pub async fn select_by_id(&self, id: i64) -> Result<Option<T>, StoreError> {
        let query = Query::<T>::for_table(&self.table).eq(T::id_column(), id);
        self.executor.fetch_optional(query).await
    }

    /// First row of a raw SELECT, if any.
    pub async fn query_one(
        &self,
        sql: impl Into<String> + Send,
        params: Vec<Value>,
    ) -> Result<Option<T>, StoreError> {
        let rows = self
            .executor
            .fetch_rows(Raw::with_params(sql, params))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Every row of a raw SELECT.
    pub async fn query_many(
        &self,
        sql: impl Into<String> + Send,
        params: Vec<Value>,
    ) -> Result<Vec<T>, StoreError> {
        self.executor.fetch_rows(Raw::with_params(sql, params)).await
    }

    /// Insert one record. Without `explicit_id` the server assigns the
    /// identity and the returned record carries it; with `explicit_id`
    /// the record's own id is inserted and zero affected rows is an
    /// error. When `sync_cache`, the (id-updated) record is appended to
    /// the cache after the insert is confirmed.
    pub async fn insert(
        &self,
        mut record: T,
        explicit_id: bool,
        sync_cache: bool,
    ) -> Result<T, StoreError> {
        if explicit_id {
            let affected = self.executor.insert_with_id(&record, &self.table).await?;
            if affected == 0 {
                return Err(StoreError::NoRowsAffected { op: "insert" });
            }
        } else {
            let id = self.executor.insert(&record, &self.table).await?;
            record.set_id(id);
        }
        if sync_cache {
            self.lock().push(record.clone());
        }
        Ok(record)
    }

    /// Update the row matching the record's id. Zero affected rows is an
    /// error and leaves the cache untouched.
    pub async fn update_by_id(&self, record: T, sync_cache: bool) -> Result<(), StoreError> {
        let affected = self.executor.update_by_id(&record, &self.table).await?;
        if affected == 0 {
            return Err(StoreError::NoRowsAffected { op: "update_by_id" });
        }
        if sync_cache && !self.replace_cached(record) {
            log::debug!("update_by_id: id not present in local cache of {}", self.table);
        }
        Ok(())
    }

    /// Delete the row with the given id. Zero affected rows is an error.
    pub async fn delete_by_id(&self, id: i64, sync_cache: bool) -> Result<(), StoreError> {
        let delete = Delete::<T>::for_table(&self.table).eq(T::id_column(), id);
        let affected = self.executor.delete(delete).await?;
        if affected == 0 {
            return Err(StoreError::NoRowsAffected { op: "delete_by_id" });
        }
        if sync_cache {
            self.remove_cached(id);
        }
        Ok(())
    }

    /// Remove every row from the table. The cache is cleared only when
    /// `sync_cache`. Clearing an already-empty table succeeds.
    pub async fn clear_table(&self, sync_cache: bool) -> Result<(), StoreError> {
        self.executor.truncate(&self.table).await?;
        if sync_cache {
            self.clear_cached();
        }
        Ok(())
    }

    /// Largest id in the table; `None` when empty.
    pub async fn last_id(&self) -> Result<Option<i64>, StoreError> {
        self.executor.max_id(&self.table, T::id_column()).await
    }

    /// Execute a raw statement; returns rows affected.
    pub async fn execute(
        &self,
        sql: impl Into<String> + Send,
        params: Vec<Value>,
    ) -> Result<u64, StoreError> {
        self.executor.execute(Raw::with_params(sql, params)).await
    }

    /// One named column of a raw SELECT.
    pub async fn query_scalars(
        &self,
        sql: impl Into<String> + Send,
        params: Vec<Value>,
        column: &str,
    ) -> Result<Vec<Value>, StoreError> {
        self.executor
            .fetch_column(Raw::with_params(sql, params), column)
            .await
    }

    /// First value of one named column of a raw SELECT, if any.
    pub async fn query_scalar(
        &self,
        sql: impl Into<String> + Send,
        params: Vec<Value>,
        column: &str,
    ) -> Result<Option<Value>, StoreError> {
        let values = self.query_scalars(sql, params, column).await?;
        Ok(values.into_iter().next())
    }

    // --- transactional whole-table replace ---

    /// Replace the table contents with the controller's own cache, inside
    /// one transaction. On success the cache is refreshed with the
    /// id-updated rows; on failure neither the table nor the cache
    /// changes.
    pub async fn save(&self, explicit_ids: bool) -> Result<(), StoreError> {
        let snapshot = self.records();
        let saved = self.replace_all(snapshot, explicit_ids).await?;
        self.set_records(saved);
        Ok(())
    }

    /// Replace the table contents with an externally supplied list,
    /// inside one transaction. Returns the list with server-assigned ids
    /// merged in; when `sync_cache`, the cache is replaced with the same
    /// list after commit.
    pub async fn save_records(
        &self,
        records: Vec<T>,
        explicit_ids: bool,
        sync_cache: bool,
    ) -> Result<Vec<T>, StoreError> {
        let saved = self.replace_all(records, explicit_ids).await?;
        if sync_cache {
            self.set_records(saved.clone());
        }
        Ok(saved)
    }

    /// Truncate-then-reinsert inside one transaction. The working list is
    /// owned, so identity writeback during the loop is invisible until
    /// commit; any failure rolls back (best-effort) and returns the
    /// original error.
    async fn replace_all(
        &self,
        mut records: Vec<T>,
        explicit_ids: bool,
    ) -> Result<Vec<T>, StoreError> {
        log::debug!(
            "save: replacing {} with {} rows (explicit_ids: {explicit_ids})",
            self.table,
            records.len()
        );
        let mut tx = self.executor.begin_transaction().await?;
        match Self::reinsert(&mut tx, &self.table, &mut records, explicit_ids).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(records)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log::debug!("save: rollback of {} also failed: {rollback_err}", self.table);
                }
                Err(err)
            }
        }
    }

    async fn reinsert(
        tx: &mut E::Transaction,
        table: &str,
        records: &mut [T],
        explicit_ids: bool,
    ) -> Result<(), StoreError> {
        tx.truncate(table).await?;
        for record in records.iter_mut() {
            if explicit_ids {
                let affected = tx.insert_with_id(&*record, table).await?;
                if affected == 0 {
                    return Err(StoreError::NoRowsAffected { op: "save" });
                }
            } else {
                let id = tx.insert(&*record, table).await?;
                record.set_id(id);
            }
        }
        Ok(())
    }
}
