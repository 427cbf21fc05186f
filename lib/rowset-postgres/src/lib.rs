//! PostgreSQL backend for rowset.
//!
//! Dialect specifics live here: `$n` positional placeholders,
//! `TRUNCATE TABLE` for whole-table clears, and `INSERT ... RETURNING`
//! for server-assigned identities. The identity column is expected to be
//! a `BIGINT` identity/`BIGSERIAL` so ids decode as `i64`.
//!
//! Row types only need `#[derive(Record)]` (plus serde derives); binding
//! and materialization go through their serde representation.
//!
//! # Usage
//!
//! ```text
//! use rowset::TableController;
//! use rowset_postgres::PgPool;
//!
//! let pool = Arc::new(PgPool::connect("postgres://localhost/app").await?);
//! let users: TableController<User, PgPool> = TableController::new(pool);
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod executor;
mod statement;

pub use executor::{PgPool, PgTransaction};
pub use statement::deserialize_row;

// Re-export core types for convenience
pub use rowset::{
    ConnectionConfig, ConnectionProfile, Delete, Filter, Order, Query, QueryExecutor, Raw, Record,
    Settings, StoreConnection, StoreError, TableController, TransactionExecutor, Value,
};
