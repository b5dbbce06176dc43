//! Best-effort removal of schema objects before a restore.
//!
//! Drops run in a fixed order (functions, tables, sequences, types), each with
//! `CASCADE`. Every step re-reads the catalog first, since a cascade in an
//! earlier step may already have taken objects with it. Failures are collected
//! in a [`CleaningReport`]; cleaning itself never fails.

use super::PostgresAdapter;
use super::SchemaScope;
use super::inspection::{self, FunctionSignature};
use crate::adapters::helpers::qualified_name;
use serde::Serialize;
use sqlx::PgConnection;

/// Object kinds removed by the cleaner, in drop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Functions, dropped by signature
    Function,
    /// Base tables
    Table,
    /// Sequences
    Sequence,
    /// Standalone types
    Type,
}

impl ObjectKind {
    /// Drop order used by the cleaner.
    pub const DROP_ORDER: [Self; 4] = [Self::Function, Self::Table, Self::Sequence, Self::Type];

    /// SQL keyword for the kind.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::Table => "TABLE",
            Self::Sequence => "SEQUENCE",
            Self::Type => "TYPE",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.keyword().to_ascii_lowercase())
    }
}

/// One droppable object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogObject {
    /// Owning schema
    pub schema: String,
    /// Object kind
    pub kind: ObjectKind,
    /// Object name
    pub name: String,
    /// Argument types, functions only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl CatalogObject {
    /// A table, sequence or type.
    pub fn new(schema: impl Into<String>, kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            kind,
            name: name.into(),
            arguments: None,
        }
    }

    /// A function overload.
    pub fn function(schema: impl Into<String>, signature: FunctionSignature) -> Self {
        Self {
            schema: schema.into(),
            kind: ObjectKind::Function,
            name: signature.name,
            arguments: Some(signature.arguments),
        }
    }

    /// `DROP ... CASCADE` statement removing this object.
    pub fn drop_statement(&self) -> String {
        let target = qualified_name(&self.schema, &self.name);
        match (&self.kind, &self.arguments) {
            (ObjectKind::Function, Some(arguments)) => {
                format!("DROP FUNCTION {} ({}) CASCADE", target, arguments)
            }
            (kind, _) => format!("DROP {} {} CASCADE", kind.keyword(), target),
        }
    }
}

impl std::fmt::Display for CatalogObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arguments {
            Some(arguments) => write!(f, "{} {}.{}({})", self.kind, self.schema, self.name, arguments),
            None => write!(f, "{} {}.{}", self.kind, self.schema, self.name),
        }
    }
}

/// A drop, or the listing of a step, that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningFailure {
    /// Schema being cleaned
    pub schema: String,
    /// Step that failed
    pub kind: ObjectKind,
    /// Object name; `None` when listing the step's objects failed
    pub name: Option<String>,
    /// Server message
    pub message: String,
}

impl std::fmt::Display for CleaningFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "failed to drop {} {}.{}: {}",
                self.kind, self.schema, name, self.message
            ),
            None => write!(
                f,
                "failed to list {}s in {}: {}",
                self.kind, self.schema, self.message
            ),
        }
    }
}

/// Outcome of a cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Objects dropped, in order
    pub dropped: Vec<CatalogObject>,
    /// Failures, in order
    pub failures: Vec<CleaningFailure>,
}

impl CleaningReport {
    /// True when nothing failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure messages, one per line item.
    pub fn error_log(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    /// Appends another report.
    pub fn merge(&mut self, other: CleaningReport) {
        self.dropped.extend(other.dropped);
        self.failures.extend(other.failures);
    }
}

async fn list_step(
    conn: &mut PgConnection,
    schema: &str,
    kind: ObjectKind,
) -> crate::Result<Vec<CatalogObject>> {
    let objects = match kind {
        ObjectKind::Function => inspection::list_functions(conn, schema)
            .await?
            .into_iter()
            .map(|signature| CatalogObject::function(schema, signature))
            .collect(),
        ObjectKind::Table => named(schema, kind, inspection::list_tables(conn, schema).await?),
        ObjectKind::Sequence => named(schema, kind, inspection::list_sequences(conn, schema).await?),
        ObjectKind::Type => named(schema, kind, inspection::list_types(conn, schema).await?),
    };
    Ok(objects)
}

fn named(schema: &str, kind: ObjectKind, names: Vec<String>) -> Vec<CatalogObject> {
    names
        .into_iter()
        .map(|name| CatalogObject::new(schema, kind, name))
        .collect()
}

/// Drops every function, table, sequence and type in `schema`.
pub(crate) async fn drop_schema(conn: &mut PgConnection, schema: &str) -> CleaningReport {
    let mut report = CleaningReport::default();

    for kind in ObjectKind::DROP_ORDER {
        let objects = match list_step(conn, schema, kind).await {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!("Could not list {}s in schema '{}': {}", kind, schema, e);
                report.failures.push(CleaningFailure {
                    schema: schema.to_string(),
                    kind,
                    name: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        for object in objects {
            let statement = object.drop_statement();
            tracing::debug!("{}", statement);

            // One-off DDL, kept out of the statement cache.
            match sqlx::query(&statement)
                .persistent(false)
                .execute(&mut *conn)
                .await
            {
                Ok(_) => report.dropped.push(object),
                Err(e) => {
                    tracing::warn!("Failed to drop {}: {}", object, e);
                    report.failures.push(CleaningFailure {
                        schema: object.schema,
                        kind,
                        name: Some(object.name),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    report
}

/// Drops the objects of every schema in `scope`, in scope order.
pub(crate) async fn clean_existing_database(conn: &mut PgConnection, scope: &SchemaScope) -> CleaningReport {
    let mut report = CleaningReport::default();
    for schema in scope.schemas() {
        report.merge(drop_schema(conn, schema).await);
    }

    tracing::info!(
        "Cleaned {} schema(s): {} object(s) dropped, {} failure(s)",
        scope.schemas().len(),
        report.dropped.len(),
        report.failures.len()
    );
    report
}

impl PostgresAdapter {
    /// Drops every function, table, sequence and type in `schema`.
    pub async fn drop_schema(&mut self, schema: &str) -> CleaningReport {
        drop_schema(self.connection(), schema).await
    }

    /// Drops the objects of every schema in `scope`.
    pub async fn clean_existing_database(&mut self, scope: &SchemaScope) -> CleaningReport {
        clean_existing_database(self.connection(), scope).await
    }
}
