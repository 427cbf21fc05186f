//! PostgreSQL statement building and serde-based binding.
//!
//! Records bind through their serde representation: values are extracted
//! in column order (matching `Record::columns()`) and added as `$n`
//! positional arguments, so row types need no sqlx derives of their own.

use rowset::{Filter, Order, Record, StoreError, Value};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Column, Row};

/// INSERT without the id column: `INSERT INTO t (a, b) VALUES ($1, $2)`.
pub(crate) fn insert_sql(table: &str, columns: &[&str]) -> String {
    let cols = columns.join(", ");
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
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
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// `UPDATE t SET a = $1, b = $2 WHERE id = $3` (id bound last).
pub(crate) fn update_by_id_sql(table: &str, id_column: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ${}", col, i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        assignments.join(", "),
        id_column,
        columns.len() + 1
    )
}

/// Build a WHERE clause from filters, numbering placeholders from
/// `start_param`.
pub(crate) fn build_where_clause(filters: &[Filter], start_param: usize) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let mut clauses = Vec::new();
    let mut param_idx = start_param;

    for filter in filters {
        let clause = match filter {
            Filter::Eq(column, _) => {
                let c = format!("{column} = ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::Ne(column, _) => {
                let c = format!("{column} != ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::Gt(column, _) => {
                let c = format!("{column} > ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::Gte(column, _) => {
                let c = format!("{column} >= ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::Lt(column, _) => {
                let c = format!("{column} < ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::Lte(column, _) => {
                let c = format!("{column} <= ${param_idx}");
                param_idx += 1;
                c
            }
            Filter::IsNull(column) => format!("{column} IS NULL"),
            Filter::IsNotNull(column) => format!("{column} IS NOT NULL"),
        };
        clauses.push(clause);
    }

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

/// Bind filter values to PgArguments.
pub(crate) fn bind_filters(args: &mut PgArguments, filters: &[Filter]) -> Result<(), StoreError> {
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

/// Bind a parameter Value to PgArguments.
pub(crate) fn bind_value(args: &mut PgArguments, value: &Value) -> Result<(), StoreError> {
    let op = "bind_value";
    match value {
        Value::String(s) => {
            args.add(s.as_str()).map_err(|e| StoreError::query(op, e))?;
        }
        Value::Int(n) => {
            args.add(*n).map_err(|e| StoreError::query(op, e))?;
        }
        Value::UInt(n) => {
            // PostgreSQL has no unsigned integers
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

/// Bind a record's field values (and optionally its id, first) as `$n`
/// arguments in column order.
pub(crate) fn bind_record<T: Record>(item: &T, with_id: bool) -> Result<PgArguments, StoreError> {
    let op = "bind_record";
    let mut args = PgArguments::default();
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

/// Bind a JSON value to PgArguments
fn bind_json_value(
    args: &mut PgArguments,
    value: &JsonValue,
    col_type: &str,
) -> Result<(), StoreError> {
    let op = "bind_json_value";
    match value {
        JsonValue::Null => {
            // Use column type to bind the correct null type
            match col_type {
                "bigint" => args.add(None::<i64>),
                "integer" => args.add(None::<i32>),
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
                if col_type == "integer" {
                    args.add(i32::try_from(i).unwrap_or(i32::MAX))
                        .map_err(|e| StoreError::query(op, e))?;
                } else {
                    args.add(i).map_err(|e| StoreError::query(op, e))?;
                }
            } else if let Some(u) = n.as_u64() {
                // PostgreSQL has no unsigned integers
                args.add(i64::try_from(u).unwrap_or(i64::MAX))
                    .map_err(|e| StoreError::query(op, e))?;
            } else if let Some(f) = n.as_f64() {
                args.add(f).map_err(|e| StoreError::query(op, e))?;
            } else {
                args.add(n.to_string()).map_err(|e| StoreError::query(op, e))?;
            }
        }
        JsonValue::String(s) => {
            args.add(s.as_str()).map_err(|e| StoreError::query(op, e))?;
        }
        JsonValue::Array(_) | JsonValue::Object(_) => {
            // Compound fields are stored as their JSON text
            args.add(value.to_string())
                .map_err(|e| StoreError::query(op, e))?;
        }
    }
    Ok(())
}

/// Materialize a PostgreSQL row as a record.
///
/// Extracts the id column plus every data column by name into a JSON
/// object keyed by the record's serde keys, then deserializes. NULL
/// columns are omitted so the field falls back to its serde default.
pub fn deserialize_row<T: Record>(row: &PgRow) -> Result<T, StoreError> {
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
pub(crate) fn extract_column_value(row: &PgRow, col_name: &str) -> Result<JsonValue, StoreError> {
    use sqlx::TypeInfo;

    let op = "extract_column_value";

    // Find the column index
    let col_idx = row
        .columns()
        .iter()
        .position(|c| c.name() == col_name)
        .ok_or_else(|| StoreError::query(op, format!("column not found: {col_name}")))?;

    let col = &row.columns()[col_idx];
    let type_name = col.type_info().name();

    // Handle based on PostgreSQL type
    let value = match type_name {
        "BOOL" => {
            let v: Option<bool> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(JsonValue::Bool).unwrap_or(JsonValue::Null)
        }
        "INT2" | "INT4" | "INT8" | "BIGINT" | "INTEGER" | "SMALLINT" => {
            let v: Option<i64> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(|n| JsonValue::Number(n.into())).unwrap_or(JsonValue::Null)
        }
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => {
            let v: Option<f64> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.and_then(|n| serde_json::Number::from_f64(n).map(JsonValue::Number))
                .unwrap_or(JsonValue::Null)
        }
        _ => {
            // Default: treat as string (VARCHAR, TEXT, CHAR, etc.)
            let v: Option<String> = row.try_get(col_idx).map_err(|e| StoreError::query(op, e))?;
            v.map(JsonValue::String).unwrap_or(JsonValue::Null)
        }
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_statements_number_placeholders() {
        assert_eq!(
            insert_sql("users", &["login", "role"]),
            "INSERT INTO users (login, role) VALUES ($1, $2)"
        );
        assert_eq!(
            insert_sql_with_id("users", "id", &["login", "role"]),
            "INSERT INTO users (id, login, role) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn update_binds_id_last() {
        assert_eq!(
            update_by_id_sql("users", "id", &["login", "role"]),
            "UPDATE users SET login = $1, role = $2 WHERE id = $3"
        );
    }

    #[test]
    fn where_clause_numbers_from_start_param() {
        let filters = vec![
            Filter::Eq("login".into(), Value::String("a".into())),
            Filter::IsNotNull("role".into()),
            Filter::Gt("id".into(), Value::Int(5)),
        ];
        assert_eq!(
            build_where_clause(&filters, 3),
            " WHERE login = $3 AND role IS NOT NULL AND id > $4"
        );
    }

    #[test]
    fn order_clause_joins_directions() {
        let order = vec![("id".to_string(), Order::Asc), ("login".to_string(), Order::Desc)];
        assert_eq!(build_order_clause(&order), " ORDER BY id ASC, login DESC");
    }
}
