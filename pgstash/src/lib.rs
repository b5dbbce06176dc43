//! Command-line interface for pgstash.
//!
//! Argument parsing and the mapping from flags to core settings live here so
//! they can be tested without running the binary.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pgstash_core::error::redact_database_url;
use pgstash_core::{
    BackupFormat, ConnectionParams, DatabaseEngine, OperationConfig, Password, Result,
};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the client tool directory.
pub const ENV_BIN_DIR: &str = "PGSTASH_BIN_DIR";

#[derive(Parser, Debug)]
#[command(name = "pgstash")]
#[command(about = "Back up and restore PostgreSQL databases")]
#[command(version)]
#[command(long_about = "
pgstash - PostgreSQL backup and restore

Runs the newest installed pg_dump, pg_restore or psql with connection
settings taken from flags, then PGUSER/PGPASSWORD/PGHOST/PGPORT/PGDATABASE,
then defaults. Before a restore, every function, table, sequence and type in
the target schemas is dropped.

Logs are written to stderr; backups go to stdout unless -f is given.

EXAMPLES:
  pgstash backup -h db.internal -U app -d app -f app.dump
  pgstash backup -d app -s public -s billing -F text > app.sql
  pgstash restore -d app_copy -f app.dump
  PGPASSWORD=secret pgstash restore -d app < app.sql
")]
pub struct Cli {
    /// Flags accepted by every subcommand
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// pgstash subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a backup to a file or stdout
    #[command(disable_help_flag = true)]
    Backup(BackupArgs),
    /// Clean the target schemas and restore a backup into them
    #[command(disable_help_flag = true)]
    Restore(RestoreArgs),
    /// Print the functions, tables, sequences and types of each schema as JSON
    #[command(disable_help_flag = true)]
    Inspect(InspectArgs),
    /// Test database connection
    #[command(disable_help_flag = true)]
    Test(TestArgs),
}

/// Verbosity flags.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

// `-h` is the host, as with the PostgreSQL client tools, so subcommand help
// is only available as `--help`.
/// Where and as whom to connect.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Database server host or socket directory
    #[arg(short = 'h', long, value_name = "HOSTNAME")]
    pub host: Option<String>,

    /// Database server port
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database user name
    #[arg(short = 'U', long = "user", visible_short_alias = 'u', value_name = "USERNAME")]
    pub user: Option<String>,

    /// Database name
    #[arg(short = 'd', long = "dbname", value_name = "DBNAME")]
    pub dbname: Option<String>,

    /// Prompt for the password
    #[arg(short = 'W', long = "password")]
    pub password_prompt: bool,

    /// Connection URL; individual flags override its parts
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Database engine
    #[arg(short = 'e', long, default_value = "postgres", value_name = "ENGINE")]
    pub engine: String,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl ConnectionArgs {
    /// Builds connection parameters: the URL first, then individual flags.
    ///
    /// # Errors
    /// Returns an error if `--url` is malformed or not a PostgreSQL URL.
    pub fn params(&self, password: Option<Password>) -> Result<ConnectionParams> {
        let mut params = match &self.url {
            Some(url) => {
                tracing::debug!("Connection URL: {}", redact_database_url(url));
                ConnectionParams::from_url(url)?
            }
            None => ConnectionParams::new(),
        };

        if let Some(host) = &self.host {
            params = params.with_host(host.clone());
        }
        if let Some(port) = self.port {
            params = params.with_port(port);
        }
        if let Some(user) = &self.user {
            params = params.with_user(user.clone());
        }
        if let Some(dbname) = &self.dbname {
            params = params.with_database(dbname.clone());
        }
        if let Some(password) = password {
            params = params.with_password(password);
        }

        Ok(params)
    }
}

/// Schemas an operation covers.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Schema to include; repeat for several. All non-system schemas if omitted.
    #[arg(short = 's', long = "schema", value_name = "SCHEMA")]
    pub schemas: Vec<String>,
}

impl ScopeArgs {
    /// `None` when no schema was named.
    pub fn schemas(&self) -> Option<Vec<String>> {
        (!self.schemas.is_empty()).then(|| self.schemas.clone())
    }
}

/// Client tool location and connect timeout.
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Directory containing pg_dump, pg_restore and psql
    #[arg(long, env = ENV_BIN_DIR, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Seconds to wait for the database connection
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub connect_timeout: u64,
}

/// Builds operation settings from the parsed flags.
///
/// # Errors
/// Returns `UnsupportedOperation` for an engine other than PostgreSQL.
pub fn operation_config(
    connection: &ConnectionArgs,
    scope: &ScopeArgs,
    tools: Option<&ToolArgs>,
) -> Result<OperationConfig> {
    let engine: DatabaseEngine = connection.engine.parse()?;
    let mut config = OperationConfig::new().with_engine(engine);

    if let Some(schemas) = scope.schemas() {
        config = config.with_schemas(schemas);
    }
    if let Some(tools) = tools {
        if let Some(bin_dir) = &tools.bin_dir {
            config = config.with_bin_dir(bin_dir.clone());
        }
        config = config.with_connect_timeout(Duration::from_secs(tools.connect_timeout));
    }

    Ok(config)
}

/// Backup formats accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormatArg {
    /// Custom-format archive (pg_dump --format custom)
    Binary,
    /// Plain SQL script
    Text,
}

impl From<BackupFormatArg> for BackupFormat {
    fn from(arg: BackupFormatArg) -> Self {
        match arg {
            BackupFormatArg::Binary => Self::Binary,
            BackupFormatArg::Text => Self::Text,
        }
    }
}

/// Restore formats accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreFormatArg {
    /// Detect from the first bytes of the input
    Auto,
    /// Custom-format archive
    Binary,
    /// Plain SQL script
    Text,
}

impl RestoreFormatArg {
    /// `None` means detect.
    pub fn format(self) -> Option<BackupFormat> {
        match self {
            Self::Auto => None,
            Self::Binary => Some(BackupFormat::Binary),
            Self::Text => Some(BackupFormat::Text),
        }
    }
}

/// Write a backup to a file or stdout
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Connection flags
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Schema selection
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Tool location
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Output file; stdout if omitted
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Backup format
    #[arg(short = 'F', long, value_enum, default_value_t = BackupFormatArg::Binary)]
    pub format: BackupFormatArg,
}

/// Clean the target schemas and restore a backup into them
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Connection flags
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Schema selection
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Tool location
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Input file; stdin if omitted
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Backup format
    #[arg(short = 'F', long, value_enum, default_value_t = RestoreFormatArg::Auto)]
    pub format: RestoreFormatArg,
}

/// Print the functions, tables, sequences and types of each schema as JSON
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Connection flags
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Schema selection
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Seconds to wait for the database connection
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub connect_timeout: u64,
}

/// Test database connection
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Connection flags
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Seconds to wait for the database connection
    #[arg(long, default_value_t = 10, value_name = "SECONDS")]
    pub connect_timeout: u64,
}
