//! SQLite backend for rowset.
//!
//! Dialect specifics live here: `?` positional placeholders,
//! `DELETE FROM` as the whole-table clear, and `last_insert_rowid()` for
//! server-assigned identities (declare the id column as
//! `INTEGER PRIMARY KEY`).
//!
//! Row types only need `#[derive(Record)]` (plus serde derives); binding
//! and materialization go through their serde representation.
//!
//! # Usage
//!
//! ```text
//! use rowset::TableController;
//! use rowset_sqlite::SqlitePool;
//!
//! let pool = Arc::new(SqlitePool::connect("sqlite::memory:").await?);
//! let users: TableController<User, SqlitePool> = TableController::new(pool);
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod executor;
mod statement;

pub use executor::{SqlitePool, SqliteTransaction};
pub use statement::deserialize_row;

// Re-export core types for convenience
pub use rowset::{
    ConnectionConfig, ConnectionProfile, Delete, Filter, Order, Query, QueryExecutor, Raw, Record,
    Settings, StoreConnection, StoreError, TableController, TransactionExecutor, Value,
};
