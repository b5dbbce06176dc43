//! Connection parameters and their resolution into a descriptor.
//!
//! This is the only place in the crate that reads the process environment for
//! connection settings. Each field is resolved independently with the
//! precedence explicit value, then environment variable, then default. The
//! variable names are the ones libpq and the PostgreSQL client tools honor, so
//! pgstash composes with an environment already set up for `psql`.

use crate::adapters::DatabaseEngine;
use crate::security::Password;
use crate::{Result, error::PgStashError};
use percent_encoding::percent_decode_str;

/// Environment variable for the user name.
pub const ENV_USER: &str = "PGUSER";
/// Environment variable for the password.
pub const ENV_PASSWORD: &str = "PGPASSWORD";
/// Environment variable for the server host.
pub const ENV_HOST: &str = "PGHOST";
/// Environment variable for the server port.
pub const ENV_PORT: &str = "PGPORT";
/// Environment variable for the database name.
pub const ENV_DATABASE: &str = "PGDATABASE";

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Variables consulted, in order, for the current OS user.
const OS_USER_VARS: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];
const FALLBACK_OS_USER: &str = "postgres";

/// Caller-supplied connection settings. Every field is optional.
///
/// # Example
/// ```rust
/// use pgstash_core::adapters::ConnectionParams;
///
/// let params = ConnectionParams::new()
///     .with_host("db.internal".to_string())
///     .with_port(6432)
///     .with_user("backup".to_string());
///
/// assert_eq!(params.host.as_deref(), Some("db.internal"));
/// assert!(params.database.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// User name
    pub user: Option<String>,
    /// Password (never logged)
    pub password: Option<Password>,
    /// Server host name or Unix socket directory
    pub host: Option<String>,
    /// Server port
    pub port: Option<u16>,
    /// Database name
    pub database: Option<String>,
}

impl ConnectionParams {
    /// Creates empty parameters; everything resolves from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `postgres://` or `postgresql://` URL.
    ///
    /// User name and password are percent-decoded and IPv6 hosts lose their
    /// brackets. Components absent from the URL stay unset so they can still
    /// resolve from the environment. The query parameters `host`, `port`,
    /// `user`, `password` and `dbname` override the matching URL parts, which
    /// is how a Unix socket directory is given (`postgres:///db?host=/run/pg`).
    ///
    /// # Errors
    /// Returns `UnsupportedOperation` for other database schemes and
    /// `Configuration` for malformed URLs or any other query parameter.
    pub fn from_url(connection_string: &str) -> Result<Self> {
        DatabaseEngine::detect(connection_string)?;

        let url = url::Url::parse(connection_string).map_err(|e| {
            PgStashError::configuration(format!("Invalid PostgreSQL connection string format: {}", e))
        })?;

        let mut params = Self {
            user: non_empty(decode(url.username())),
            password: url
                .password()
                .map(decode)
                .and_then(non_empty)
                .map(Password::new),
            host: url
                .host()
                .map(|host| match host {
                    url::Host::Domain(domain) => decode(domain),
                    url::Host::Ipv4(addr) => addr.to_string(),
                    url::Host::Ipv6(addr) => addr.to_string(),
                })
                .and_then(non_empty),
            port: url.port(),
            database: non_empty(decode(url.path().trim_start_matches('/'))),
        };

        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "host" => params.host = non_empty(value),
                "port" => {
                    let port = value.parse().map_err(|_| {
                        PgStashError::configuration(format!("Invalid port in connection URL: {}", value))
                    })?;
                    params.port = Some(port);
                }
                "user" => params.user = non_empty(value),
                "password" => params.password = non_empty(value).map(Password::new),
                "dbname" => params.database = non_empty(value),
                other => {
                    return Err(PgStashError::configuration(format!(
                        "Unsupported connection URL parameter: {}",
                        other
                    )));
                }
            }
        }

        Ok(params)
    }

    /// Builder method to set the user.
    pub fn with_user(mut self, user: String) -> Self {
        self.user = Some(user);
        self
    }

    /// Builder method to set the password.
    pub fn with_password(mut self, password: Password) -> Self {
        self.password = Some(password);
        self
    }

    /// Builder method to set the host.
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Builder method to set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set the database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }
}

/// A fully resolved connection target. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    user: String,
    password: Password,
    host: String,
    port: u16,
    database: String,
}

impl ConnectionDescriptor {
    /// Creates a descriptor from already-resolved values.
    pub fn new(user: String, password: Password, host: String, port: u16, database: String) -> Self {
        Self {
            user,
            password,
            host,
            port,
            database,
        }
    }

    /// Resolves parameters against the process environment.
    pub fn resolve(params: &ConnectionParams) -> Self {
        Self::resolve_with(params, |key| std::env::var(key).ok())
    }

    /// Resolves parameters against an explicit environment lookup.
    ///
    /// Empty values, explicit or from the environment, count as unset.
    /// Never fails: an unparseable port falls back to the default.
    pub fn resolve_with<F>(params: &ConnectionParams, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).and_then(non_empty);

        let user = params
            .user
            .clone()
            .and_then(non_empty)
            .or_else(|| env(ENV_USER))
            .unwrap_or_else(|| current_os_user(&env));

        let password = params
            .password
            .clone()
            .filter(Password::is_present)
            .or_else(|| env(ENV_PASSWORD).map(Password::new))
            .unwrap_or_default();

        let host = params
            .host
            .clone()
            .and_then(non_empty)
            .or_else(|| env(ENV_HOST))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = params
            .port
            .or_else(|| {
                env(ENV_PORT).and_then(|raw| match raw.trim().parse::<u16>() {
                    Ok(port) if port > 0 => Some(port),
                    _ => {
                        tracing::warn!("Ignoring invalid {} value '{}'", ENV_PORT, raw);
                        None
                    }
                })
            })
            .unwrap_or(DEFAULT_PORT);

        let database = params
            .database
            .clone()
            .and_then(non_empty)
            .or_else(|| env(ENV_DATABASE))
            .unwrap_or_else(|| user.clone());

        Self {
            user,
            password,
            host,
            port,
            database,
        }
    }

    /// User name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password, `None` when empty
    pub fn password(&self) -> Option<&str> {
        self.password.expose()
    }

    /// Server host name or Unix socket directory
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never include the password
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

fn current_os_user<F>(env: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    OS_USER_VARS
        .iter()
        .find_map(|key| env(key))
        .unwrap_or_else(|| FALLBACK_OS_USER.to_string())
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
