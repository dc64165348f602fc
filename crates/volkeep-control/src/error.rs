//! Error types for the control loop.
//!
//! The variants follow how far a failure is allowed to propagate: item
//! failures stay inside a batch, transport failures end at most the current
//! cycle, and configuration failures keep the previous configuration in
//! effect. None of them stops the loop.

use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while driving reconciliation.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Configuration(#[from] volkeep_config::ConfigError),

    /// The service credential could not be acquired.
    #[error("authentication error: {0}")]
    Authentication(#[from] volkeep_auth::AuthError),

    /// The selected endpoint did not answer usefully.
    #[error("transport error on {endpoint}: {source}")]
    Transport {
        /// Endpoint the call was sent to.
        endpoint: String,
        /// Underlying cluster error.
        source: volkeep_cluster::ClusterError,
    },

    /// One item of an action batch failed.
    #[error("{action} of volume {volume} failed: {reason}")]
    PartialActionFailure {
        /// Action being performed.
        action: &'static str,
        /// Volume acted on.
        volume: String,
        /// What went wrong.
        reason: String,
    },

    /// Something looked inconsistent but was safe to ignore.
    #[error("consistency warning: {0}")]
    ConsistencyWarning(String),
}

impl ControlError {
    /// Returns true if the error should abort process startup.
    #[must_use]
    pub const fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if a later attempt may succeed without operator action.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Authentication(e) => e.is_retriable(),
            Self::Transport { .. } | Self::PartialActionFailure { .. } => true,
            Self::Configuration(_) | Self::ConsistencyWarning(_) => false,
        }
    }
}
