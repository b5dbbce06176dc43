//! Connection setup and the reachability probe.
//!
//! One connection per operation, never pooled. Every failure here is a
//! `Connection` error naming the host and port tried, so callers can tell an
//! unreachable server apart from a later tool failure.

use super::PostgresAdapter;
use crate::adapters::ConnectionDescriptor;
use crate::{Result, error::PgStashError};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::time::Duration;

const APPLICATION_NAME: &str = "pgstash";

/// Builds driver options from a resolved descriptor.
///
/// A host starting with `/` is a Unix socket directory, as with libpq.
pub(crate) fn connect_options(descriptor: &ConnectionDescriptor) -> PgConnectOptions {
    let options = PgConnectOptions::new();
    let options = if descriptor.host().starts_with('/') {
        options.socket(descriptor.host())
    } else {
        options.host(descriptor.host())
    };

    let options = options
        .port(descriptor.port())
        .username(descriptor.user())
        .database(descriptor.database())
        .application_name(APPLICATION_NAME);

    match descriptor.password() {
        Some(password) => options.password(password),
        None => options,
    }
}

impl PostgresAdapter {
    /// Opens a connection to the described database.
    ///
    /// # Errors
    /// Returns `Connection` if the server is unreachable, rejects the
    /// credentials, or does not answer within `timeout`.
    pub async fn connect(descriptor: ConnectionDescriptor, timeout: Duration) -> Result<Self> {
        tracing::debug!("Connecting to {}", descriptor);
        let options = connect_options(&descriptor);

        let conn = match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::error!(
                    "Connection to {}:{} failed: {}",
                    descriptor.host(),
                    descriptor.port(),
                    e
                );
                return Err(PgStashError::connection_failed(
                    descriptor.host(),
                    descriptor.port(),
                    e,
                ));
            }
            Err(elapsed) => {
                tracing::error!(
                    "Connection to {}:{} timed out after {:?}",
                    descriptor.host(),
                    descriptor.port(),
                    timeout
                );
                return Err(PgStashError::connection_failed(
                    descriptor.host(),
                    descriptor.port(),
                    elapsed,
                ));
            }
        };

        Ok(Self { conn, descriptor })
    }

    /// Wraps an already-open connection.
    pub fn with_connection(conn: PgConnection, descriptor: ConnectionDescriptor) -> Self {
        Self { conn, descriptor }
    }

    /// Runs `SELECT 1` to prove the connection is usable.
    ///
    /// # Errors
    /// Returns `Connection` if the round trip fails.
    pub async fn test_connection(&mut self) -> Result<()> {
        let result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| {
                PgStashError::connection_failed(self.descriptor.host(), self.descriptor.port(), e)
            })?;

        if result != 1 {
            return Err(PgStashError::connection_failed(
                self.descriptor.host(),
                self.descriptor.port(),
                std::io::Error::other("connectivity probe returned an unexpected result"),
            ));
        }

        tracing::debug!("Connectivity probe succeeded for {}", self.descriptor);
        Ok(())
    }

    /// Closes the connection gracefully. Failures are logged, not returned.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!("Error while closing connection: {}", e);
        }
    }

    pub(super) fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}
