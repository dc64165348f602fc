//! Error types for the cluster crate.

use thiserror::Error;

/// Errors that can occur while talking to the cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// No usable answer from the endpoint: connect failure, timeout, HTTP
    /// error status or truncated body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not the expected JSON shape.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The cluster answered and rejected the call.
    #[error("{call} rejected: {message}")]
    Api {
        /// REST call name.
        call: String,
        /// Error descriptions reported by the cluster.
        message: String,
    },

    /// A cluster command-line tool failed.
    #[error("{command} failed: {message}")]
    Command {
        /// The command that was run.
        command: String,
        /// Exit status and stderr.
        message: String,
    },

    /// The request could not be built from the given volume.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClusterError {
    /// Returns true if the endpoint should be considered unhealthy and the
    /// caller should fail over to the next one.
    #[must_use]
    pub const fn requires_failover(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Parse(_))
    }
}

/// A specialized Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;
