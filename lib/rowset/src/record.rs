//! Record trait for database-agnostic row types.
//!
//! Types implementing `Record` can be managed by a
//! [`TableController`](crate::TableController) against any supported
//! backend. Add `#[derive(Record)]` with `#[record(table = "table_name")]`
//! to generate the implementation.

use crate::StoreError;
use serde_json::Value as JsonValue;

/// Trait for row types bound to one database table.
///
/// Provides the column metadata and identity accessors backends need to
/// build and bind statements. Generated by `#[derive(Record)]`.
///
/// # Example
///
/// ```text
/// #[derive(Record, Serialize, Deserialize, Clone, Default)]
/// #[record(table = "users")]
/// #[serde(default)]
/// pub struct User {
///     #[id]
///     pub id: i64,
///     pub login: String,
///     // ...
/// }
/// ```
///
/// # Column naming
///
/// Database columns default to the Rust field names. Use
/// `#[column(name = "custom_name")]` to override a column name and
/// `#[column(skip)]` to exclude a field from storage entirely.
///
/// # Identity
///
/// The `#[id]` field (or, absent the marker, the field literally named
/// `id`) is the integer identity column. An id of `0` means "not yet
/// persisted"; inserts without an explicit id write the server-assigned
/// value back through [`set_id`](Record::set_id). The field must be `i64`.
///
/// # Nulls
///
/// Rows are materialized through serde: a SQL NULL leaves the field at its
/// serde default, so plain-`String`/integer fields want `#[serde(default)]`
/// (or `Option` types). A NULL never fails materialization.
pub trait Record: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync {
    /// The default database table for this type.
    fn table_name() -> &'static str;

    /// Name of the integer identity column.
    fn id_column() -> &'static str {
        "id"
    }

    /// Serde key of the identity field, for row materialization.
    fn id_json_key() -> &'static str {
        "id"
    }

    /// Non-id column names, in the fixed order used by statement builders.
    fn columns() -> &'static [&'static str];

    /// Database-agnostic type tags in column order, used by backends to
    /// bind NULLs with the correct type.
    /// Values: "text", "bigint", "integer", "real", "boolean"
    fn column_types() -> &'static [&'static str];

    /// Serde key names in column order. Corresponds 1:1 with `columns()`.
    fn json_keys() -> &'static [&'static str];

    /// Number of non-id columns.
    fn column_count() -> usize {
        Self::columns().len()
    }

    /// Current identity value (`0` = not yet persisted).
    fn id(&self) -> i64;

    /// Overwrite the identity value (used for server-assigned ids).
    fn set_id(&mut self, id: i64);

    /// Every persisted non-id field, serialized in column order for
    /// positional binding.
    fn field_values(&self) -> Result<Vec<JsonValue>, StoreError> {
        let json = serde_json::to_value(self)?;
        let obj = json.as_object().ok_or_else(|| {
            StoreError::Config(format!(
                "record type for table {} must serialize to a JSON object",
                Self::table_name()
            ))
        })?;
        Ok(Self::json_keys()
            .iter()
            .map(|key| obj.get(*key).cloned().unwrap_or(JsonValue::Null))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Default, PartialEq, Debug)]
    #[serde(default)]
    struct Gadget {
        id: i64,
        label: String,
        weight: i64,
    }

    impl Record for Gadget {
        fn table_name() -> &'static str {
            "gadgets"
        }
        fn columns() -> &'static [&'static str] {
            &["label", "weight"]
        }
        fn column_types() -> &'static [&'static str] {
            &["text", "bigint"]
        }
        fn json_keys() -> &'static [&'static str] {
            &["label", "weight"]
        }
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    #[test]
    fn field_values_follow_column_order() {
        let gadget = Gadget {
            id: 7,
            label: "widget".into(),
            weight: 12,
        };
        let values = gadget.field_values().unwrap();
        assert_eq!(values, vec![serde_json::json!("widget"), serde_json::json!(12)]);
    }

    #[test]
    fn missing_keys_become_null() {
        // A field_values call never fails over an absent key; it binds NULL.
        #[derive(Serialize, Deserialize, Clone, Default)]
        struct Sparse {
            id: i64,
        }
        impl Record for Sparse {
            fn table_name() -> &'static str {
                "sparse"
            }
            fn columns() -> &'static [&'static str] {
                &["ghost"]
            }
            fn column_types() -> &'static [&'static str] {
                &["text"]
            }
            fn json_keys() -> &'static [&'static str] {
                &["ghost"]
            }
            fn id(&self) -> i64 {
                self.id
            }
            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
        let values = Sparse { id: 1 }.field_values().unwrap();
        assert_eq!(values, vec![serde_json::Value::Null]);
    }
}
