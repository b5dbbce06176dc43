//! Password container with automatic memory zeroing.
//!
//! # Security
//! - The secret is stored in a `Zeroizing<String>` and cleared on drop
//! - `Debug` never prints the secret
//! - An empty password is treated as "no password"

use zeroize::Zeroizing;

/// Database password that zeroes its memory when dropped.
///
/// # Example
///
/// ```rust
/// use pgstash_core::security::Password;
///
/// let password = Password::new("secret".to_string());
/// assert_eq!(password.expose(), Some("secret"));
/// assert_eq!(format!("{:?}", password), "Password(****)");
/// assert_eq!(Password::default().expose(), None);
/// ```
#[derive(Clone)]
pub struct Password {
    secret: Zeroizing<String>,
}

impl Password {
    /// Wraps a password, moving it into zeroizing storage.
    pub fn new(secret: String) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }

    /// Returns the secret, or `None` when the password is empty.
    pub fn expose(&self) -> Option<&str> {
        if self.secret.is_empty() {
            None
        } else {
            Some(self.secret.as_str())
        }
    }

    /// Checks if a password is present without exposing it.
    pub fn is_present(&self) -> bool {
        !self.secret.is_empty()
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_present() {
            f.write_str("Password(****)")
        } else {
            f.write_str("Password(<none>)")
        }
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        *self.secret == *other.secret
    }
}

impl Eq for Password {}
