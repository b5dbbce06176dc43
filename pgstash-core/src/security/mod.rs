//! Credential protection.
//!
//! Passwords are held in `Zeroizing` containers, never logged, and only ever
//! handed to child processes through the `PGPASSWORD` environment variable.

mod credentials;

pub use credentials::Password;
