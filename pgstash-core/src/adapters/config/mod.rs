//! Configuration types for database adapters.
//!
//! - `ConnectionParams` / `ConnectionDescriptor`: connection settings and
//!   their resolution against the environment
//! - `OperationConfig`: scope, tool directory and timeouts of one operation
//! - `BackupFormat`: binary archive or plain SQL

mod connection;
mod operation;

pub use connection::{
    ConnectionDescriptor, ConnectionParams, DEFAULT_HOST, DEFAULT_PORT, ENV_DATABASE, ENV_HOST,
    ENV_PASSWORD, ENV_PORT, ENV_USER,
};
pub use operation::{BackupFormat, OperationConfig};
