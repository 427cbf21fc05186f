//! SQLite statement building and serde-based binding.
//!
//! Same serde-driven binding as the PostgreSQL backend, in SQLite's
//! dialect: `?` positional placeholders and `DELETE FROM` as the
//! whole-table clear (SQLite has no TRUNCATE; an unqualified DELETE is
//! its bulk-clear form). Bound values are owned, so argument lists are
//! free of borrows into the record.

use rowset::{Filter, Order, Record, StoreError, Value};
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, Column, Row};

/// INSERT without the id column: `INSERT INTO t (a, b) VALUES (?, ?)`.
pub(crate) fn insert_sql(table: &str, columns: &[&str]) -> String {
    let cols = columns.join(", ");
    let placeholders = vec!["?"; columns.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols,
        placeholders.join(", ")
    )
}

/// INSERT including the id column, id bound first.
pub(crate) fn insert_sql_with_id(table: &str, id_column: &str, columns: &[&str]) -> String {
    let mut cols = Vec::with_capacity(columns.len() + 1);
    cols.push(id_column);
    cols.extend_from_slice(columns);
    let placeholders = vec!["?"; cols.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// `UPDATE t SET a = ?, b = ? WHERE id = ?` (id bound last).
pub(crate) fn update_by_id_sql(table: &str, id_column: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns.iter().map(|col| format!("{col} = ?")).collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    )
}

/// Build a WHERE clause from filters.
pub(crate) fn build_where_clause(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, _) => format!("{column} = ?"),
            Filter::Ne(column, _) => format!("{column} != ?"),
            Filter::Gt(column, _) => format!("{column} > ?"),
            Filter::Gte(column, _) => format!("{column} >= ?"),
            Filter::Lt(column, _) => format!("{column} < ?"),
            Filter::Lte(column, _) => format!("{column} <= ?"),
            Filter::IsNull(column) => format!("{column} IS NULL"),
            Filter::IsNotNull(column) => format!("{column} IS NOT NULL"),
        })
        .collect();

    format!(" WHERE {}", clauses.join(" AND "))
}

/// Build an ORDER BY clause.
pub(crate) fn build_order_clause(order_by: &[(String, Order)]) -> String {
    if order_by.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = order_by
        .iter()
        .map(|(column, order)| {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!("{column} {dir}")
        })
        .collect();

    format!(" ORDER BY {}", clauses.join(", "))
}

/// Bind filter values.
pub(crate) fn bind_filters<'q>(
    args: &mut SqliteArguments<'q>,
    filters: &[Filter],
) -> Result<(), StoreError> {
    for filter in filters {
        match filter {
            Filter::Eq(_, value)
            | Filter::Ne(_, value)
            | Filter::Gt(_, value)
            | Filter::Gte(_, value)
            | Filter::Lt(_, value)
            | Filter::Lte(_, value) => {
                bind_value(args, value)?;
            }
            Filter::IsNull(_) | Filter::IsNotNull(_) => {
                // No binding needed
            }
        }
    }
    Ok(())
}

/// Bind a parameter Value.
pub(crate) fn bind_value<'q>(
    args: &mut SqliteArguments<'q>,
    value: &Value,
) -> Result<(), StoreError> {
    let op = "bind_value";
    match value {
        Value::String(s) => {
            args.add(s.clone()).map_err(|e| StoreError::query(op, e))?;
        }
        Value::Int(n) => {
            args.add(*n).map_err(|e| StoreError::query(op, e))?;
        }
        Value::UInt(n) => {
            // SQLite integers are signed 64-bit
            args.add(i64::try_from(*n).unwrap_or(i64::MAX))
                .map_err(|e| StoreError::query(op, e))?;
        }
        Value::Float(n) => {
            args.add(*n).map_err(|e| StoreError::query(op, e))?;
        }
        Value::Bool(b) => {
            args.add(*b).map_err(|e| StoreError::query(op, e))?;
        }
        Value::Null => {
            args.add(None::<String>).map_err(|e| StoreError::query(op, e))?;
        }
    }
    Ok(())
}

/// Bind a record's field values (and optionally its id, first) in column
/// order.
pub(crate) fn bind_record<'q, T: Record>(
    item: &T,
    with_id: bool,
) -> Result<SqliteArguments<'q>, StoreError> {
    let op = "bind_record";
    let mut args = SqliteArguments::default();
    if with_id {
        args.add(item.id()).map_err(|e| StoreError::query(op, e))?;
    }

    let values = item.field_values()?;
    let column_types = T::column_types();
    for (idx, value) in values.iter().enumerate() {
        let col_type = column_types.get(idx).copied().unwrap_or("text");
        bind_json_value(&mut args, value, col_type)?;
    }
    Ok(args)
}

/// Bind a JSON value.
fn bind_json_value<'q>(
    args: &mut SqliteArguments<'q>,
    value: &JsonValue,
    col_type: &str,
) -> Result<(), StoreError> {
    let op = "bind_json_value";
    match value {
        JsonValue::Null => {
            match col_type {
                "bigint" | "integer" => args.add(None::<i64>),
                "real" => args.add(None::<f64>),
                "boolean" => args.add(None::<bool>),
                _ => args.add(None::<String>), // text and default
            }
            .map_err(|e| StoreError::query(op, e))?;
        }
        JsonValue::Bool(b) => {
            args.add(*b).map_err(|e| StoreError::query(op, e))?;
        }
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                args.add(i).map_err(|e| StoreError::query(op, e))?;
            } else if let Some(u) = n.as_u64() {
                args.add(i64::try_from(u).unwrap_or(i64::MAX))
                    .map_err(|e| StoreError::query(op, e))?;
            } else if let Some(f) = n.as_f64() {
                args.add(f).map_err(|e| StoreError::query(op, e))?;
            } else {
                args.add(n.to_string()).map_err(|e| StoreError::query(op, e))?;
            }
        }
        JsonValue::String(s) => {
            args.add(s.clone()).map_err(|e| StoreError::query(op, e))?;
        }
        JsonValue::Array(_) | JsonValue::Object(_) => {
            // Compound fields are stored as their JSON text
            args.add(value.to_string())
                .map_err(|e| StoreError::query(op, e))?;
        }
    }
    Ok(())
}

/// Materialize a SQLite row as a record.
///
/// Extracts the id column plus every data column by name into a JSON
/// object keyed by the record's serde keys, then deserializes. NULL
/// columns are omitted so the field falls back to its serde default.
pub fn deserialize_row<T: Record>(row: &SqliteRow) -> Result<T, StoreError> {
    let mut obj = serde_json::Map::new();

    let id = extract_column_value(row, T::id_column())?;
    if !id.is_null() {
        obj.insert(T::id_json_key().to_string(), id);
    }

    for (col_name, json_key) in T::columns().iter().zip(T::json_keys().iter()) {
        let value = extract_column_value(row, col_name)?;
        // Skip null values so serde defaults apply
        if !value.is_null() {
            obj.insert((*json_key).to_string(), value);
        }
    }

    serde_json::from_value(JsonValue::Object(obj))
        .map_err(|e| StoreError::query("deserialize_row", e))
}

/// Extract a column value from a row as JSON
pub(crate) fn extract_column_value(
    row: &SqliteRow,
    col_name: &str,
) -> Result<JsonValue, StoreError> {
    use sqlx::TypeInfo;

    let op = "extract_column_value";

    let col_idx = row
        .columns()
        .iter()
        .position(|c| c.name() == col_name)
        .ok_or_else(|| StoreError::query(op, format!("column not found: {col_name}")))?;

    let col = &row.columns()[col_idx];
    let type_name = col.type_info().name();

    // Handle based on SQLite storage class. Expression columns (and
    // columns whose first row is NULL) can come back typed "NULL", so
    // anything unrecognized falls through to probing the storage classes.
    let value = match type_name {
        "BOOLEAN" => {
            let v: Option<bool> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(JsonValue::Bool).unwrap_or(JsonValue::Null)
        }
        "INTEGER" | "INT4" | "INT8" | "BIGINT" => {
            let v: Option<i64> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(|n| JsonValue::Number(n.into())).unwrap_or(JsonValue::Null)
        }
        "REAL" => {
            let v: Option<f64> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.and_then(|n| serde_json::Number::from_f64(n).map(JsonValue::Number))
                .unwrap_or(JsonValue::Null)
        }
        "TEXT" => {
            let v: Option<String> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(JsonValue::String).unwrap_or(JsonValue::Null)
        }
        _ => probe_value(row, col_idx),
    };

    Ok(value)
}

/// Probe a dynamically-typed value through the storage classes.
fn probe_value(row: &SqliteRow, col_idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(col_idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(col_idx) {
        return serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(col_idx) {
        return JsonValue::String(v);
    }
    JsonValue::Null
}
