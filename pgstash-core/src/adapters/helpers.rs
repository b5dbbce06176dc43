//! Helper utilities shared by the PostgreSQL adapter modules.

use crate::{Result, error::PgStashError};
use sqlx::{Row, postgres::PgRow};

/// Extension trait for extracting typed values from catalog rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// use pgstash_core::adapters::helpers::RowExt;
///
/// let name: String = row.get_field("proname", "pg_proc")?;
/// ```
pub trait RowExt {
    /// Extracts a typed field, naming the catalog in the error.
    fn get_field<'r, T>(&'r self, field_name: &str, catalog: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>;
}

impl RowExt for PgRow {
    fn get_field<'r, T>(&'r self, field_name: &str, catalog: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        self.try_get(field_name).map_err(|e| {
            PgStashError::query_failed(
                format!("Failed to parse field '{}' from {}", field_name, catalog),
                e,
            )
        })
    }
}

/// Quotes an SQL identifier, doubling embedded double quotes.
///
/// ```rust
/// use pgstash_core::adapters::helpers::quote_ident;
///
/// assert_eq!(quote_ident("public"), "\"public\"");
/// assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes a schema-qualified name.
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}
