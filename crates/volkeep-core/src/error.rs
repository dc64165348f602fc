//! Common error types for volkeep.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while parsing core value types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The creation interval is not one of `day`, `month`, `year` or `none`.
    #[error("unknown creation interval: {0}")]
    UnknownInterval(String),

    /// The replication type is not recognised.
    #[error("unknown replication type: {0}")]
    UnknownReplicationType(String),

    /// The accounting entity type code is neither user (0) nor group (1).
    #[error("invalid accounting entity type: {0}")]
    InvalidAccountingEntityType(u8),

    /// The permission string is not a valid octal mode.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
}
