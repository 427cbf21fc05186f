//! rowset - a thin generic data-access layer over relational databases.
//!
//! One [`TableController`] binds a row type to a database table, mirrors
//! (a possibly stale view of) the table in an in-process cache, and
//! offers CRUD, raw statements, and a transactional whole-table replace.
//!
//! # Core pieces
//!
//! - [`Record`]: the row-model capability bound — table/column metadata,
//!   identity accessors, ordered field serialization (derive with
//!   `#[derive(Record)]`)
//! - [`TableController`]: cache + CRUD + transactional save over a shared
//!   executor
//! - [`QueryExecutor`] / [`TransactionExecutor`]: the driver boundary,
//!   implemented by the backend crates (`rowset-postgres`,
//!   `rowset-sqlite`)
//! - [`Settings`]: explicit named connection profiles, built once at
//!   startup

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod controller;
mod error;
mod query;
mod record;
mod settings;

pub use controller::TableController;
pub use error::StoreError;
pub use query::{
    Delete, Filter, Order, Query, QueryExecutor, Raw, TransactionExecutor, Value,
};
pub use record::Record;
pub use settings::{ConnectionConfig, ConnectionProfile, Settings, StoreConnection};

// Re-export derive macro
pub use rowset_derive::Record;
