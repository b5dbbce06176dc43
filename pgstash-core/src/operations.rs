//! One-call backup and restore.
//!
//! Each function runs the whole pipeline for one logical operation on one
//! connection: validate, resolve, connect and probe, resolve the schema scope,
//! locate the client tools, then stream. Nothing destructive happens and no
//! process is spawned until the probe has succeeded.

use crate::adapters::postgres::{
    CleaningReport, OperationResult, PgTools, PostgresAdapter, SchemaInventory, SchemaScope,
};
use crate::adapters::{
    BackupFormat, ConnectionDescriptor, ConnectionParams, DatabaseEngine, OperationConfig,
};
use crate::{Result, error::PgStashError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Outcome of [`backup`].
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Schemas covered
    pub scope: SchemaScope,
    /// Format written to the sink
    pub format: BackupFormat,
    /// Tool outcome
    pub result: OperationResult,
}

/// Outcome of [`restore`].
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// Schemas cleaned and restored
    pub scope: SchemaScope,
    /// Format read from the source, given or detected
    pub format: BackupFormat,
    /// What the pre-restore cleaning removed and what it could not
    pub cleaning: CleaningReport,
    /// Tool outcome
    pub result: OperationResult,
}

async fn open(params: &ConnectionParams, config: &OperationConfig) -> Result<PostgresAdapter> {
    config.validate()?;

    match config.engine {
        DatabaseEngine::PostgreSQL => {
            let descriptor = ConnectionDescriptor::resolve(params);
            let mut adapter = PostgresAdapter::connect(descriptor, config.connect_timeout).await?;
            adapter.test_connection().await?;
            Ok(adapter)
        }
    }
}

/// Probes the database with `SELECT 1`.
///
/// # Errors
/// Returns `Connection` if the server cannot be reached.
pub async fn check_connection(
    params: &ConnectionParams,
    config: &OperationConfig,
) -> Result<ConnectionDescriptor> {
    let adapter = open(params, config).await?;
    let descriptor = adapter.descriptor().clone();
    adapter.close().await;
    Ok(descriptor)
}

/// Lists the objects of every schema in scope.
///
/// # Errors
/// Returns `Connection` if the server cannot be reached and `Query` if a
/// catalog query fails.
pub async fn inspect(
    params: &ConnectionParams,
    config: &OperationConfig,
) -> Result<Vec<SchemaInventory>> {
    let mut adapter = open(params, config).await?;
    let scope = adapter.resolve_scope(config.schemas.clone()).await?;

    let mut inventories = Vec::with_capacity(scope.schemas().len());
    for schema in scope.schemas() {
        inventories.push(adapter.inspect_schema(schema).await?);
    }

    adapter.close().await;
    Ok(inventories)
}

/// Streams a backup of the configured schemas into `sink`.
///
/// # Errors
/// Returns `Configuration` for invalid settings, `Connection` if the server
/// cannot be reached, `ToolNotFound`, `Spawn` or `Io` for local failures. A
/// non-zero `pg_dump` exit is reported in the returned [`BackupReport`].
pub async fn backup<W>(
    sink: &mut W,
    params: &ConnectionParams,
    config: &OperationConfig,
    format: BackupFormat,
) -> Result<BackupReport>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut adapter = open(params, config).await?;
    let scope = adapter.resolve_scope(config.schemas.clone()).await?;
    let tools = PgTools::locate(config.bin_dir.as_deref())?;

    tracing::info!(
        "Backing up {} schema(s) from {} as {}",
        scope.schemas().len(),
        adapter.descriptor(),
        format
    );
    let result = adapter.backup(&tools, &scope, format, sink).await?;

    adapter.close().await;
    Ok(BackupReport {
        scope,
        format,
        result,
    })
}

/// Returns the format to restore with and the bytes consumed to decide it.
///
/// The header is read even when the format is given: an empty source must be
/// refused before the target schemas are cleaned.
async fn detect_format<R>(
    source: &mut R,
    format: Option<BackupFormat>,
) -> Result<(BackupFormat, Vec<u8>)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = Vec::with_capacity(BackupFormat::ARCHIVE_MAGIC.len());
    (&mut *source)
        .take(BackupFormat::ARCHIVE_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .await
        .map_err(|e| PgStashError::io("Failed to read restore input", e))?;

    if header.is_empty() {
        return Err(PgStashError::configuration("restore input is empty"));
    }

    let format = match format {
        Some(format) => format,
        None => {
            let detected = BackupFormat::sniff(&header);
            tracing::debug!("Detected {} backup", detected);
            detected
        }
    };
    Ok((format, header))
}

/// Cleans the configured schemas and restores `source` into them.
///
/// With `format` unset, a source starting with `PGDMP` is treated as a
/// custom-format archive and anything else as a SQL script. The sniffed
/// bytes are replayed ahead of the rest of the stream.
///
/// # Errors
/// Returns `Configuration` for invalid settings or an empty source (nothing
/// is cleaned in that case), `Connection` if the server
/// cannot be reached, `ToolNotFound`, `Spawn` or `Io` for local failures.
/// Cleaning failures and a non-zero tool exit are reported in the returned
/// [`RestoreReport`].
pub async fn restore<R>(
    source: &mut R,
    params: &ConnectionParams,
    config: &OperationConfig,
    format: Option<BackupFormat>,
) -> Result<RestoreReport>
where
    R: AsyncRead + Unpin + Send + ?Sized,
{
    let mut adapter = open(params, config).await?;
    let scope = adapter.resolve_scope(config.schemas.clone()).await?;
    let tools = PgTools::locate(config.bin_dir.as_deref())?;

    let (format, header) = detect_format(source, format).await?;

    let cleaning = adapter.clean_existing_database(&scope).await;
    for failure in &cleaning.failures {
        tracing::warn!("{}", failure);
    }

    tracing::info!(
        "Restoring {} backup into {} schema(s) of {}",
        format,
        scope.schemas().len(),
        adapter.descriptor()
    );
    let mut input = std::io::Cursor::new(header).chain(&mut *source);
    let result = adapter.restore(&tools, &scope, format, &mut input).await?;

    adapter.close().await;
    Ok(RestoreReport {
        scope,
        format,
        cleaning,
        result,
    })
}
