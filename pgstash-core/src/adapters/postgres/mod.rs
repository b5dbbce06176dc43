//! PostgreSQL adapter: catalog inspection, pre-restore cleaning, and
//! translation of backup/restore requests into client tool invocations.
//!
//! # Module Structure
//! - `connection`: single (unpooled) connection and the reachability probe
//! - `inspection`: catalog queries listing schemas and their objects
//! - `cleaning`: best-effort, dependency-ordered object removal
//! - `tools`: locating the newest installed client tools
//! - `commands`: building `pg_dump`/`pg_restore`/`psql` command lines
//! - `process`: running one command with its stdio wired to caller streams
//!
//! # Guarantees
//! - Catalog queries bind the schema name as a parameter
//! - The password reaches child processes only through `PGPASSWORD`
//! - Backup bytes stream through without being held in memory

mod cleaning;
mod commands;
mod connection;
mod inspection;
mod process;
mod tools;


use super::{BackupFormat, ConnectionDescriptor};
use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tokio::io::{AsyncRead, AsyncWrite};

pub use cleaning::{CatalogObject, CleaningFailure, CleaningReport, ObjectKind};
pub use commands::{CommandInvocation, CommandKind, translate};
pub use inspection::{FunctionSignature, SchemaInventory};
pub use process::{OperationResult, run_backup, run_restore};
pub use tools::{InstallRoot, PgTool, PgTools, ToolVersion, default_install_roots};

/// The set of schemas an operation covers.
///
/// Whether the list came from the caller matters: only an explicit scope is
/// forwarded to the client tools as `--schema` flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "schemas", rename_all = "lowercase")]
pub enum SchemaScope {
    /// Schemas named by the caller
    Explicit(Vec<String>),
    /// Every non-system schema found in the catalog
    Discovered(Vec<String>),
}

impl SchemaScope {
    /// Schema names in scope
    pub fn schemas(&self) -> &[String] {
        match self {
            Self::Explicit(schemas) | Self::Discovered(schemas) => schemas,
        }
    }

    /// True when the caller named the schemas
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

/// PostgreSQL adapter holding one live connection for one logical operation.
pub struct PostgresAdapter {
    conn: PgConnection,
    descriptor: ConnectionDescriptor,
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl PostgresAdapter {
    /// The resolved connection target
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Uses the caller's schemas when given, otherwise discovers every
    /// non-system schema.
    pub async fn resolve_scope(&mut self, explicit: Option<Vec<String>>) -> Result<SchemaScope> {
        match explicit {
            Some(schemas) => Ok(SchemaScope::Explicit(schemas)),
            None => {
                let schemas = self.list_non_system_schemas().await?;
                tracing::debug!("Discovered schemas: {:?}", schemas);
                Ok(SchemaScope::Discovered(schemas))
            }
        }
    }

    /// Streams a backup of `scope` in `format` into `sink`.
    pub async fn backup<W>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        format: BackupFormat,
        sink: &mut W,
    ) -> Result<OperationResult>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let invocation = translate(tools, &self.descriptor, scope, CommandKind::backup(format));
        run_backup(&invocation, sink).await
    }

    /// Streams a `format` backup from `source` into the database.
    ///
    /// Does not clean the target first; see
    /// [`clean_existing_database`](Self::clean_existing_database).
    pub async fn restore<R>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        format: BackupFormat,
        source: &mut R,
    ) -> Result<OperationResult>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let invocation = translate(tools, &self.descriptor, scope, CommandKind::restore(format));
        run_restore(&invocation, source).await
    }

    /// Custom-format archive with large objects.
    pub async fn backup_binary<W>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        sink: &mut W,
    ) -> Result<OperationResult>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.backup(tools, scope, BackupFormat::Binary, sink).await
    }

    /// Plain SQL script.
    pub async fn backup_text<W>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        sink: &mut W,
    ) -> Result<OperationResult>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.backup(tools, scope, BackupFormat::Text, sink).await
    }

    /// Replays a custom-format archive without ownership or privileges.
    pub async fn restore_binary<R>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        source: &mut R,
    ) -> Result<OperationResult>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.restore(tools, scope, BackupFormat::Binary, source).await
    }

    /// Feeds a plain SQL script to `psql`.
    pub async fn restore_text<R>(
        &self,
        tools: &PgTools,
        scope: &SchemaScope,
        source: &mut R,
    ) -> Result<OperationResult>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.restore(tools, scope, BackupFormat::Text, source).await
    }
}
