use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, parse_macro_input};

/// Check if a field has a specific attribute
fn has_attr(field: &syn::Field, attr_name: &str) -> bool {
    field
        .attrs
        .iter()
        .any(|attr| attr.path().is_ident(attr_name))
}

/// Check if a field has #[column(skip)]
fn has_column_skip(field: &syn::Field) -> bool {
    for attr in &field.attrs {
        if attr.path().is_ident("column") {
            let mut skip = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                }
                Ok(())
            });
            if skip {
                return true;
            }
        }
    }
    false
}

/// Get custom column name from #[column(name = "...")] or None
fn get_column_name(field: &syn::Field) -> Option<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("column") {
            let mut name = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    meta.input.parse::<syn::Token![=]>()?;
                    let lit: Lit = meta.input.parse()?;
                    if let Lit::Str(s) = lit {
                        name = Some(s.value());
                    }
                }
                Ok(())
            });
            if name.is_some() {
                return name;
            }
        }
    }
    None
}

/// Map Rust type to generic SQL type name
fn rust_type_to_sql_type(ty: &syn::Type) -> &'static str {
    let type_str = quote::quote!(#ty).to_string();
    // Remove spaces for easier matching
    let type_str = type_str.replace(' ', "");

    // Check for Option<T> - extract inner type
    let inner_type = if type_str.starts_with("Option<") && type_str.ends_with('>') {
        &type_str[7..type_str.len() - 1]
    } else {
        type_str.as_str()
    };

    match inner_type {
        // Integer types
        "u64" | "i64" => "bigint",
        "u32" | "i32" | "u16" | "i16" | "usize" | "isize" => "integer",
        // Floats
        "f32" | "f64" => "real",
        // Boolean
        "bool" => "boolean",
        // Default to text for String and everything else
        _ => "text",
    }
}

/// Parse #[record(table = "...")] attribute and return table name
fn parse_record_attr(input: &DeriveInput) -> Option<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("record") {
            let mut table_name = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    meta.input.parse::<syn::Token![=]>()?;
                    let lit: Lit = meta.input.parse()?;
                    if let Lit::Str(s) = lit {
                        table_name = Some(s.value());
                    }
                }
                Ok(())
            });
            return table_name;
        }
    }
    None
}

/// Derive macro for the `Record` trait.
///
/// Generates the row-model metadata (table name, column lists, column
/// types, serde keys) plus identity accessors, and an inherent `new()`
/// constructor taking every non-id field.
///
/// ## Attributes
///
/// - `#[record(table = "table_name")]` on the struct (required)
/// - `#[id]` marks the identity field; absent the marker, the field
///   literally named `id` is used. The field must be `i64`; inserts write
///   server-assigned identities back through it.
/// - `#[column(skip)]` excludes a field from storage
/// - `#[column(name = "custom_name")]` overrides a column name
///
/// The type must also derive `Serialize`, `Deserialize`, and `Clone`;
/// statement binding and row materialization go through serde, so fields
/// that may come back as SQL NULL want `#[serde(default)]` or `Option`.
///
/// ## Example
///
/// ```text
/// #[derive(Record, Serialize, Deserialize, Clone, Default)]
/// #[record(table = "users")]
/// #[serde(default)]
/// pub struct User {
///     #[id]
///     pub id: i64,
///     pub login: String,
///     pub role: String,
/// }
/// // Use: let user = User::new("admin".into(), "root".into());
/// ```
#[proc_macro_derive(Record, attributes(record, id, column))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("Record only supports structs with named fields"),
        },
        _ => panic!("Record only supports structs"),
    };

    let table_name =
        parse_record_attr(&input).expect("Record requires #[record(table = \"...\")]");

    let id_field = fields
        .iter()
        .find(|f| has_attr(f, "id"))
        .or_else(|| {
            fields
                .iter()
                .find(|f| f.ident.as_ref().is_some_and(|i| i == "id"))
        })
        .expect("Record requires an #[id] field or a field named `id`");
    let id_field_name = id_field.ident.as_ref().unwrap();
    let id_column = get_column_name(id_field).unwrap_or_else(|| id_field_name.to_string());
    let id_json_key = id_field_name.to_string();

    // Collect column names, types, and serde keys for every non-id,
    // non-skipped field
    let mut column_names: Vec<String> = Vec::new();
    let mut column_types: Vec<&'static str> = Vec::new();
    let mut json_keys: Vec<String> = Vec::new();

    // Collect fields for new() - every persisted field except the id
    let mut new_params = Vec::new();
    let mut new_field_inits = Vec::new();

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_ty = &field.ty;
        let is_id = std::ptr::eq(field, id_field);

        if is_id {
            new_field_inits.push(quote! { #field_name: 0 });
            continue;
        }
        if has_column_skip(field) {
            new_field_inits.push(quote! { #field_name: Default::default() });
            continue;
        }

        let col_name = get_column_name(field).unwrap_or_else(|| field_name.to_string());
        column_names.push(col_name);
        column_types.push(rust_type_to_sql_type(field_ty));
        json_keys.push(field_name.to_string());

        new_params.push(quote! { #field_name: #field_ty });
        new_field_inits.push(quote! { #field_name });
    }

    let column_count = column_names.len();
    let column_literals: Vec<_> = column_names.iter().map(|s| s.as_str()).collect();
    let column_type_literals: Vec<_> = column_types.to_vec();
    let json_key_literals: Vec<_> = json_keys.iter().map(|s| s.as_str()).collect();

    let expanded = quote! {
        impl #name {
            /// Create a new instance with the identity initialized to 0
            /// ("not yet persisted"). Skipped columns take their defaults.
            pub fn new(#(#new_params),*) -> Self {
                Self {
                    #(#new_field_inits),*
                }
            }
        }

        impl rowset::Record for #name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn id_column() -> &'static str {
                #id_column
            }

            fn id_json_key() -> &'static str {
                #id_json_key
            }

            fn columns() -> &'static [&'static str] {
                &[#(#column_literals),*]
            }

            fn column_types() -> &'static [&'static str] {
                &[#(#column_type_literals),*]
            }

            fn json_keys() -> &'static [&'static str] {
                &[#(#json_key_literals),*]
            }

            fn column_count() -> usize {
                #column_count
            }

            fn id(&self) -> i64 {
                self.#id_field_name
            }

            fn set_id(&mut self, id: i64) {
                self.#id_field_name = id;
            }
        }
    };

    TokenStream::from(expanded)
}
