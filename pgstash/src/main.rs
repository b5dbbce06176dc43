//! PostgreSQL backup and restore tool.
//!
//! Drives `pg_dump`, `pg_restore` and `psql`, streaming backups between the
//! client tools and files or standard streams.
//!
//! # Security Guarantees
//! - Passwords are never accepted as flag values; use `-W` or `PGPASSWORD`
//! - No credentials are logged
//! - Logs go to stderr so they never mix with backup data on stdout

use anyhow::Context;
use clap::Parser;
use pgstash::{Cli, Command, ConnectionArgs, operation_config};
use pgstash_core::logging::init_logging;
use pgstash_core::{
    BackupFormat, BackupReport, ConnectionParams, OperationConfig, OperationResult, Password,
    operations,
};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Backup(args) => {
            let params = args.connection.params(prompt_password(&args.connection)?)?;
            let config = operation_config(&args.connection, &args.scope, Some(&args.tools))?;
            let format: BackupFormat = args.format.into();

            let report = match &args.file {
                Some(path) => backup_to_file(path, &params, &config, format).await?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    operations::backup(&mut stdout, &params, &config, format).await?
                }
            };
            Ok(exit_code(&report.result))
        }
        Command::Restore(args) => {
            let params = args.connection.params(prompt_password(&args.connection)?)?;
            let config = operation_config(&args.connection, &args.scope, Some(&args.tools))?;

            let mut source: Box<dyn AsyncRead + Unpin + Send> = match &args.file {
                Some(path) => Box::new(
                    tokio::fs::File::open(path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                ),
                None => Box::new(tokio::io::stdin()),
            };

            let report = operations::restore(&mut source, &params, &config, args.format.format()).await?;
            if !report.cleaning.is_complete() {
                warn!(
                    "{} object(s) could not be dropped before the restore",
                    report.cleaning.failures.len()
                );
            }
            if !report.result.stdout.is_empty() {
                debug!("{}", report.result.stdout_lossy().trim_end());
            }
            Ok(exit_code(&report.result))
        }
        Command::Inspect(args) => {
            let params = args.connection.params(prompt_password(&args.connection)?)?;
            let config = operation_config(&args.connection, &args.scope, None)?
                .with_connect_timeout(Duration::from_secs(args.connect_timeout));

            let inventories = operations::inspect(&params, &config).await?;
            let json = serde_json::to_string_pretty(&inventories)
                .context("Failed to serialize schema inventories")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Test(args) => {
            info!("Testing database connection...");
            let params = args.connection.params(prompt_password(&args.connection)?)?;
            let config = operation_config(&args.connection, &Default::default(), None)?
                .with_connect_timeout(Duration::from_secs(args.connect_timeout));

            let descriptor = operations::check_connection(&params, &config).await?;
            println!("Connection to {} successful", descriptor);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Writes the backup next to `path` and renames it into place only once
/// `pg_dump` has succeeded, so a failed run leaves an existing file intact.
async fn backup_to_file(
    path: &Path,
    params: &ConnectionParams,
    config: &OperationConfig,
    format: BackupFormat,
) -> anyhow::Result<BackupReport> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".pgstash-")
        .suffix(".partial")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    let (file, staged_path) = staged.into_parts();

    let mut file = tokio::fs::File::from_std(file);
    let report = operations::backup(&mut file, params, config, format).await?;
    file.flush()
        .await
        .with_context(|| format!("Failed to write {}", staged_path.display()))?;
    drop(file);

    if report.result.success() {
        staged_path
            .persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move the backup to {}", path.display()))?;
        info!("Backup written to {}", path.display());
    } else {
        debug!("Discarding partial backup {}", staged_path.display());
    }
    Ok(report)
}

/// Reads the password from the terminal when `-W` was given.
fn prompt_password(args: &ConnectionArgs) -> anyhow::Result<Option<Password>> {
    if !args.password_prompt {
        return Ok(None);
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    Ok(Some(Password::new(password)))
}

/// Echoes the tool's stderr when it failed.
fn exit_code(result: &OperationResult) -> ExitCode {
    if result.success() {
        let stderr = result.stderr_lossy();
        if !stderr.trim().is_empty() {
            debug!("{}: {}", result.program, stderr.trim_end());
        }
        return ExitCode::SUCCESS;
    }

    eprint!("{}", result.stderr_lossy());
    match result.exit_code {
        Some(code) => eprintln!("{} exited with status {}", result.program, code),
        None => eprintln!("{} was terminated by a signal", result.program),
    }
    ExitCode::FAILURE
}
