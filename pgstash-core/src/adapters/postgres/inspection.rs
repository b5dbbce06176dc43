//! Catalog queries enumerating schemas and the objects inside them.
//!
//! Results are never cached: every call reads the catalog again, so the
//! cleaner always sees what earlier cascading drops left behind. The schema
//! name is always bound as `$1`.

use super::PostgresAdapter;
use crate::adapters::helpers::RowExt;
use crate::{Result, error::PgStashError};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// Base tables of one schema.
const TABLES_QUERY: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const SEQUENCES_QUERY: &str = r#"
    SELECT sequence_name::text AS sequence_name
    FROM information_schema.sequences
    WHERE sequence_schema = $1
    ORDER BY sequence_name
"#;

/// User-defined types: no backing relation, or a standalone composite type.
/// Array shadow types (whose element type points back at them) are skipped,
/// as are the implicit row types of tables, views and sequences.
const TYPES_QUERY: &str = r#"
    SELECT t.typname::text AS type_name
    FROM pg_catalog.pg_type t
    LEFT JOIN pg_catalog.pg_namespace n
        ON n.oid = t.typnamespace
    WHERE
        (
            t.typrelid = 0
            OR (
                SELECT c.relkind = 'c'
                FROM pg_catalog.pg_class c
                WHERE c.oid = t.typrelid
            )
        )
        AND NOT EXISTS (
            SELECT 1
            FROM pg_catalog.pg_type el
            WHERE el.oid = t.typelem
              AND el.typarray = t.oid
        )
        AND n.nspname = $1
    ORDER BY t.typname
"#;

/// Every routine in the schema with its identity argument types, minus the
/// ones an extension owns: those go away with `DROP EXTENSION` only.
const FUNCTIONS_QUERY: &str = r#"
    SELECT
        p.proname::text AS function_name,
        oidvectortypes(p.proargtypes)::text AS arguments
    FROM pg_catalog.pg_proc p
    INNER JOIN pg_catalog.pg_namespace ns
        ON p.pronamespace = ns.oid
    WHERE ns.nspname = $1
      AND NOT EXISTS (
          SELECT 1
          FROM pg_catalog.pg_depend d
          WHERE d.classid = 'pg_catalog.pg_proc'::regclass
            AND d.objid = p.oid
            AND d.deptype = 'e'
      )
    ORDER BY p.proname, arguments
"#;

/// Schemas outside the built-in catalog namespaces, in catalog order.
///
/// `pg_%` is a LIKE pattern: `_` matches any single character, so a user
/// schema such as `pgaudit` is treated as a system schema too.
const NON_SYSTEM_SCHEMAS_QUERY: &str = r#"
    SELECT schema_name::text AS schema_name
    FROM information_schema.schemata
    WHERE schema_name NOT LIKE 'pg_%'
      AND schema_name <> 'information_schema'
"#;

/// A function name together with its argument-type signature, which is what
/// `DROP FUNCTION` needs to identify one overload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Function name
    pub name: String,
    /// Comma separated argument types, e.g. `integer, text`
    pub arguments: String,
}

impl FunctionSignature {
    /// Creates a new signature.
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

impl std::fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// The backup-relevant objects of one schema at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInventory {
    /// Schema name
    pub schema: String,
    /// Functions with argument signatures
    pub functions: Vec<FunctionSignature>,
    /// Base tables
    pub tables: Vec<String>,
    /// Sequences
    pub sequences: Vec<String>,
    /// Standalone types
    pub types: Vec<String>,
}

impl SchemaInventory {
    /// True when the schema holds none of the four object kinds.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.tables.is_empty()
            && self.sequences.is_empty()
            && self.types.is_empty()
    }

    /// Total number of objects across the four kinds.
    pub fn object_count(&self) -> usize {
        self.functions.len() + self.tables.len() + self.sequences.len() + self.types.len()
    }
}

async fn list_names(
    conn: &mut PgConnection,
    query: &str,
    column: &str,
    catalog: &str,
    schema: &str,
) -> Result<Vec<String>> {
    let rows = sqlx::query(query)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list {} for schema '{}': {}", catalog, schema, e);
            PgStashError::query_failed(format!("Failed to query {} for schema '{}'", catalog, schema), e)
        })?;

    rows.iter()
        .map(|row| row.get_field::<String>(column, catalog))
        .collect()
}

/// Lists base tables in `schema`.
pub(crate) async fn list_tables(conn: &mut PgConnection, schema: &str) -> Result<Vec<String>> {
    list_names(conn, TABLES_QUERY, "table_name", "information_schema.tables", schema).await
}

/// Lists sequences in `schema`.
pub(crate) async fn list_sequences(conn: &mut PgConnection, schema: &str) -> Result<Vec<String>> {
    list_names(
        conn,
        SEQUENCES_QUERY,
        "sequence_name",
        "information_schema.sequences",
        schema,
    )
    .await
}

/// Lists standalone user-defined types in `schema`.
pub(crate) async fn list_types(conn: &mut PgConnection, schema: &str) -> Result<Vec<String>> {
    list_names(conn, TYPES_QUERY, "type_name", "pg_type", schema).await
}

/// Lists functions in `schema` with their argument signatures.
pub(crate) async fn list_functions(
    conn: &mut PgConnection,
    schema: &str,
) -> Result<Vec<FunctionSignature>> {
    let rows = sqlx::query(FUNCTIONS_QUERY)
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list functions for schema '{}': {}", schema, e);
            PgStashError::query_failed(format!("Failed to query pg_proc for schema '{}'", schema), e)
        })?;

    let mut functions = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.get_field("function_name", "pg_proc")?;
        let arguments: String = row.get_field("arguments", "pg_proc")?;
        functions.push(FunctionSignature { name, arguments });
    }

    Ok(functions)
}

/// Lists every schema not reserved by the server.
pub(crate) async fn list_non_system_schemas(conn: &mut PgConnection) -> Result<Vec<String>> {
    let rows = sqlx::query(NON_SYSTEM_SCHEMAS_QUERY)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to enumerate schemas: {}", e);
            PgStashError::query_failed("Failed to enumerate schemas from information_schema.schemata", e)
        })?;

    rows.iter()
        .map(|row| row.get_field::<String>("schema_name", "information_schema.schemata"))
        .collect()
}

/// Collects all four object lists for `schema`.
pub(crate) async fn inspect_schema(conn: &mut PgConnection, schema: &str) -> Result<SchemaInventory> {
    let inventory = SchemaInventory {
        schema: schema.to_string(),
        functions: list_functions(conn, schema).await?,
        tables: list_tables(conn, schema).await?,
        sequences: list_sequences(conn, schema).await?,
        types: list_types(conn, schema).await?,
    };

    tracing::debug!(
        "Schema '{}': {} functions, {} tables, {} sequences, {} types",
        schema,
        inventory.functions.len(),
        inventory.tables.len(),
        inventory.sequences.len(),
        inventory.types.len()
    );

    Ok(inventory)
}

impl PostgresAdapter {
    /// Lists base tables in `schema`.
    pub async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>> {
        list_tables(self.connection(), schema).await
    }

    /// Lists sequences in `schema`.
    pub async fn list_sequences(&mut self, schema: &str) -> Result<Vec<String>> {
        list_sequences(self.connection(), schema).await
    }

    /// Lists standalone user-defined types in `schema`.
    pub async fn list_types(&mut self, schema: &str) -> Result<Vec<String>> {
        list_types(self.connection(), schema).await
    }

    /// Lists functions in `schema` with their argument signatures.
    pub async fn list_functions(&mut self, schema: &str) -> Result<Vec<FunctionSignature>> {
        list_functions(self.connection(), schema).await
    }

    /// Lists every schema not reserved by the server.
    pub async fn list_non_system_schemas(&mut self) -> Result<Vec<String>> {
        list_non_system_schemas(self.connection()).await
    }

    /// Collects all four object lists for `schema`.
    pub async fn inspect_schema(&mut self, schema: &str) -> Result<SchemaInventory> {
        inspect_schema(self.connection(), schema).await
    }
}
