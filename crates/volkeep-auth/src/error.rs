//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while acquiring a service credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The keytab file does not exist or cannot be read.
    #[error("keytab not readable: {0}")]
    KeytabUnavailable(String),

    /// The login command could not be started.
    #[error("failed to run login command: {0}")]
    CommandFailed(String),

    /// The credential server rejected the login.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if a later attempt may succeed without operator action.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::LoginFailed(_) | Self::CommandFailed(_))
    }
}
