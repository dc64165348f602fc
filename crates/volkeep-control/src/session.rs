//! Cycle-spanning loop state.
//!
//! The [`Session`] is owned by the control loop and lent to the engine and
//! executor for one cycle at a time. It carries the endpoint selection, the
//! consecutive failure counter, the credential and configuration reload
//! bookkeeping.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::warn;
use volkeep_auth::Credential;

/// The result of recording a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverOutcome {
    /// Endpoint that failed.
    pub from: String,
    /// Endpoint selected for the next call.
    pub to: String,
    /// Consecutive failures including this one.
    pub failures: u32,
    /// True exactly when this failure reached the alarm threshold.
    pub threshold_reached: bool,
}

/// Mutable state carried across reconciliation cycles.
#[derive(Debug, Clone)]
pub struct Session {
    endpoints: Vec<String>,
    endpoint_index: usize,
    consecutive_failures: u32,
    failure_threshold: u32,
    credential: Option<Credential>,
    last_loaded: Option<SystemTime>,
    config_reloaded: bool,
}

impl Session {
    /// Create a session targeting the first of `endpoints`.
    #[must_use]
    pub const fn new(endpoints: Vec<String>, failure_threshold: u32) -> Self {
        Self {
            endpoints,
            endpoint_index: 0,
            consecutive_failures: 0,
            failure_threshold,
            credential: None,
            last_loaded: None,
            config_reloaded: false,
        }
    }

    /// The endpoint cluster calls are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoints
            .get(self.endpoint_index)
            .map_or("", String::as_str)
    }

    /// Index of the selected endpoint.
    #[must_use]
    pub const fn endpoint_index(&self) -> usize {
        self.endpoint_index
    }

    /// Replace the endpoint list after a reload, keeping the index in range.
    pub fn set_endpoints(&mut self, endpoints: Vec<String>, failure_threshold: u32) {
        self.endpoint_index = if endpoints.is_empty() {
            0
        } else {
            self.endpoint_index % endpoints.len()
        };
        self.endpoints = endpoints;
        self.failure_threshold = failure_threshold;
    }

    /// Consecutive transport failures since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Advance to the next endpoint and count the failure.
    ///
    /// The threshold is reported once per crossing; further failures keep
    /// counting without reporting it again.
    pub fn record_transport_failure(&mut self) -> FailoverOutcome {
        let from = self.endpoint().to_string();
        if !self.endpoints.is_empty() {
            self.endpoint_index = (self.endpoint_index + 1) % self.endpoints.len();
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let outcome = FailoverOutcome {
            from,
            to: self.endpoint().to_string(),
            failures: self.consecutive_failures,
            threshold_reached: self.consecutive_failures == self.failure_threshold,
        };
        warn!(
            from = %outcome.from,
            to = %outcome.to,
            failures = outcome.failures,
            "Switching cluster endpoint"
        );
        outcome
    }

    /// Reset the failure counter after a successful inventory fetch.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// The current credential, if logged in.
    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Expiry of the current credential.
    #[must_use]
    pub fn credential_expiry(&self) -> Option<DateTime<Utc>> {
        self.credential.as_ref().map(|c| c.expires_at)
    }

    /// Store a freshly acquired credential.
    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    /// Forget the credential, forcing a login before the next cycle.
    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    /// When the configuration was last loaded or a load last attempted.
    #[must_use]
    pub const fn last_loaded(&self) -> Option<SystemTime> {
        self.last_loaded
    }

    /// Record a configuration load attempt at `at`.
    ///
    /// `reloaded` raises the one-cycle reload flag.
    pub fn mark_loaded(&mut self, at: SystemTime, reloaded: bool) {
        self.last_loaded = Some(at);
        if reloaded {
            self.config_reloaded = true;
        }
    }

    /// Returns true during the cycle following a configuration load.
    #[must_use]
    pub const fn config_reloaded(&self) -> bool {
        self.config_reloaded
    }

    /// Drop the reload flag once the cycle has been executed.
    pub fn clear_reload(&mut self) {
        self.config_reloaded = false;
    }
}
