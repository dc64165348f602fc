//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// A result type using `ConfigError`.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A group definition file that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    /// File the definition was read from.
    pub path: PathBuf,
    /// Every validation failure found in the file.
    pub reasons: Vec<String>,
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file or directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON for its document type.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Path being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The manager settings are invalid.
    #[error("invalid manager configuration: {0}")]
    InvalidManager(String),

    /// One or more volume group definitions are invalid.
    #[error("{} invalid volume group definition(s)", .skipped.len())]
    InvalidGroups {
        /// The rejected definitions with their reasons.
        skipped: Vec<SkippedGroup>,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
