//! Database adapters.
//!
//! PostgreSQL is the only engine with an adapter. Every other engine name or
//! URL scheme is rejected up front with `UnsupportedOperation`, before any
//! connection or process is attempted.
//!
//! # Module Structure
//! - `config`: connection parameters, descriptor resolution, operation settings
//! - `helpers`: row extraction and identifier quoting
//! - `postgres`: inspection, cleaning, command translation and process running

use crate::{Result, error::PgStashError};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod helpers;
pub mod postgres;

pub use config::{BackupFormat, ConnectionDescriptor, ConnectionParams, OperationConfig};

/// Database engines pgstash knows how to back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseEngine {
    /// PostgreSQL, driven through pg_dump/pg_restore/psql
    PostgreSQL,
}

impl DatabaseEngine {
    /// Detects the engine from a connection URL scheme.
    ///
    /// # Errors
    /// Returns `UnsupportedOperation` for any scheme other than
    /// `postgres://` or `postgresql://`.
    pub fn detect(connection_string: &str) -> Result<Self> {
        if connection_string.starts_with("postgres://")
            || connection_string.starts_with("postgresql://")
        {
            return Ok(Self::PostgreSQL);
        }

        let scheme = connection_string
            .split_once("://")
            .map_or("unknown", |(scheme, _)| scheme);
        Err(PgStashError::unsupported("backup and restore", scheme))
    }
}

impl std::str::FromStr for DatabaseEngine {
    type Err = PgStashError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            other => Err(PgStashError::unsupported("backup and restore", other)),
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "postgres"),
        }
    }
}
