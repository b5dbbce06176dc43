//! Settings shared by backup and restore operations.

use crate::adapters::DatabaseEngine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Backup serialization formats produced by `pg_dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFormat {
    /// Compressed custom archive, replayed with `pg_restore`. Starts with `PGDMP`.
    Binary,
    /// Plain SQL script, replayed with `psql`.
    Text,
}

impl BackupFormat {
    /// Leading bytes of every custom-format archive.
    pub const ARCHIVE_MAGIC: &'static [u8; 5] = b"PGDMP";

    /// Classifies a stream by its first bytes.
    pub fn sniff(header: &[u8]) -> Self {
        if header.starts_with(Self::ARCHIVE_MAGIC) {
            Self::Binary
        } else {
            Self::Text
        }
    }
}

impl std::fmt::Display for BackupFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Configuration for one backup or restore operation.
///
/// # Example
/// ```rust
/// use pgstash_core::adapters::OperationConfig;
/// use std::time::Duration;
///
/// let config = OperationConfig::new()
///     .with_schemas(vec!["public".to_string(), "billing".to_string()])
///     .with_connect_timeout(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    /// Target database engine
    pub engine: DatabaseEngine,
    /// Explicit schema scope; `None` means every non-system schema
    pub schemas: Option<Vec<String>>,
    /// Directory holding `pg_dump`, `pg_restore` and `psql`; searched when unset
    pub bin_dir: Option<PathBuf>,
    /// Time allowed for the initial connection
    pub connect_timeout: Duration,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            engine: DatabaseEngine::PostgreSQL,
            schemas: None,
            bin_dir: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl OperationConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration before any connection is attempted.
    ///
    /// # Errors
    /// Returns error if a schema name is empty, the schema list is empty, or
    /// the connect timeout is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(schemas) = &self.schemas {
            if schemas.is_empty() {
                return Err(crate::error::PgStashError::configuration(
                    "explicit schema list cannot be empty",
                ));
            }
            if schemas.iter().any(|s| s.trim().is_empty()) {
                return Err(crate::error::PgStashError::configuration(
                    "schema names cannot be empty",
                ));
            }
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::PgStashError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the engine.
    pub fn with_engine(mut self, engine: DatabaseEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Builder method to set an explicit schema scope.
    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Builder method to set the tool directory.
    pub fn with_bin_dir(mut self, bin_dir: PathBuf) -> Self {
        self.bin_dir = Some(bin_dir);
        self
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
