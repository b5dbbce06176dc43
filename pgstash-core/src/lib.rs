//! Core library for pgstash: PostgreSQL backup and restore orchestration.
//!
//! pgstash drives the installed PostgreSQL client tools (`pg_dump`,
//! `pg_restore`, `psql`) and adds what they lack on their own: connection
//! settings resolved from explicit values, `PG*` environment variables and
//! defaults, schema discovery, and a best-effort cleaning pass that empties
//! the target schemas before a restore.
//!
//! # Security Guarantees
//! - Passwords are zeroized on drop, redacted in `Debug` output and never logged
//! - Child processes receive the password only through `PGPASSWORD`
//! - Catalog queries bind schema names; DDL quotes every identifier
//!
//! # Example
//! ```rust,no_run
//! use pgstash_core::{BackupFormat, ConnectionParams, OperationConfig, operations};
//!
//! # async fn example() -> pgstash_core::Result<()> {
//! let params = ConnectionParams::from_url("postgres://backup@localhost/app")?;
//! let config = OperationConfig::new().with_schemas(vec!["public".to_string()]);
//!
//! let mut file = tokio::fs::File::create("app.dump").await.unwrap();
//! let report = operations::backup(&mut file, &params, &config, BackupFormat::Binary).await?;
//! assert!(report.result.success());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod error;
pub mod logging;
pub mod operations;
pub mod security;

pub use adapters::postgres::{
    CleaningReport, FunctionSignature, OperationResult, PgTools, PostgresAdapter,
    SchemaInventory, SchemaScope,
};
pub use adapters::{
    BackupFormat, ConnectionDescriptor, ConnectionParams, DatabaseEngine, OperationConfig,
};
pub use error::{PgStashError, Result};
pub use operations::{BackupReport, RestoreReport};
pub use security::Password;
