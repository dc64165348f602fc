//! The reconciliation control loop.
//!
//! [`ControlLoop`] owns the configuration snapshot and the [`Session`] and
//! drives the [`LoopState`] machine until shutdown. Each cycle reloads the
//! configuration if it changed, fetches the inventory, prepares a batch
//! and executes it. The next cycle starts one loop interval after the
//! previous one started, or immediately if the cycle overran.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use volkeep_auth::AuthProvider;
use volkeep_cluster::{AclService, ClusterApi, ClusterError, FsService};
use volkeep_config::{ConfigStore, LoadedConfig};

use crate::alarm;
use crate::error::{ControlError, Result};
use crate::executor::ActionExecutor;
use crate::lifecycle::{self, LoopState};
use crate::reconcile::ReconciliationEngine;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::types::CycleReport;

/// Alarm description for a run of failed inventory fetches.
pub const INVENTORY_ALARM: &str = "volume list retrieval failed";

/// The external services the loop acts through.
#[derive(Clone)]
pub struct Collaborators {
    /// Configuration source.
    pub store: Arc<dyn ConfigStore>,
    /// Cluster management API.
    pub cluster: Arc<dyn ClusterApi>,
    /// Mount directory operations.
    pub fs: Arc<dyn FsService>,
    /// Public grant application.
    pub acl: Arc<dyn AclService>,
    /// Credential acquisition.
    pub auth: Arc<dyn AuthProvider>,
}

/// Drives reconciliation cycles until shutdown.
pub struct ControlLoop {
    services: Collaborators,
    config: LoadedConfig,
    session: Session,
    state: LoopState,
}

impl ControlLoop {
    /// Create a loop from an already loaded configuration.
    ///
    /// The first cycle treats the configuration as freshly reloaded.
    #[must_use]
    pub fn new(services: Collaborators, config: LoadedConfig, loaded_at: SystemTime) -> Self {
        let mut session = Session::new(
            config.manager.endpoints(),
            config.manager.failure_alarm_threshold,
        );
        session.mark_loaded(loaded_at, true);

        Self {
            services,
            config,
            session,
            state: LoopState::Unauthenticated,
        }
    }

    /// Load the configuration and create the loop.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Configuration` if the configuration cannot be
    /// loaded; the process should not start.
    pub fn start(services: Collaborators) -> Result<Self> {
        let loaded_at = SystemTime::now();
        let config = services.store.load()?;
        info!(
            groups = config.groups.len(),
            endpoints = config.manager.rest_nodes.len(),
            loop_interval_secs = config.manager.loop_interval.as_secs(),
            "Configuration loaded"
        );
        Ok(Self::new(services, config, loaded_at))
    }

    /// The current loop state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// The cycle-spanning session state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The configuration currently in effect.
    #[must_use]
    pub const fn config(&self) -> &LoadedConfig {
        &self.config
    }

    fn transition(&mut self, to: LoopState) {
        debug_assert!(
            lifecycle::is_valid_transition(self.state, to),
            "invalid loop transition {} -> {}, expected one of {:?}",
            self.state,
            to,
            lifecycle::valid_transitions_from(self.state)
        );
        debug!(from = %self.state, to = %to, "Loop state change");
        self.state = to;
    }

    /// Acquire a credential.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Authentication` if the login fails.
    pub async fn login(&mut self) -> Result<()> {
        let credential = self
            .services
            .auth
            .login(&self.config.manager.credential)
            .await?;
        info!(
            principal = %credential.principal,
            expires_at = %credential.expires_at,
            "Logged in"
        );
        self.session.set_credential(credential);
        Ok(())
    }

    /// Returns true if a credential is held and has not expired.
    #[must_use]
    pub fn credential_valid(&self) -> bool {
        self.session
            .credential()
            .is_some_and(|c| !self.services.auth.is_expired(c, Utc::now()))
    }

    /// Reload the configuration if the store reports a change since the
    /// last load attempt.
    ///
    /// A failed reload keeps the previous configuration and is not retried
    /// until the files change again. Returns true if a new configuration
    /// took effect.
    pub fn reload_if_changed(&mut self, now: SystemTime) -> bool {
        let since = self.session.last_loaded().unwrap_or(UNIX_EPOCH);
        match self.services.store.changed_since(since) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(error = %e, "Could not check configuration for changes");
                return false;
            }
        }

        match self.services.store.load() {
            Ok(config) => {
                info!(groups = config.groups.len(), "Configuration reloaded");
                self.session.set_endpoints(
                    config.manager.endpoints(),
                    config.manager.failure_alarm_threshold,
                );
                self.config = config;
                self.session.mark_loaded(now, true);
                true
            }
            Err(e) => {
                let e = ControlError::from(e);
                error!(error = %e, "Reload failed, keeping previous configuration");
                self.session.mark_loaded(now, false);
                false
            }
        }
    }

    /// Run one reconciliation cycle for `today`.
    pub async fn run_cycle(&mut self, today: NaiveDate) -> CycleReport {
        let started = Instant::now();
        self.reload_if_changed(SystemTime::now());

        let endpoint = self.session.endpoint().to_string();
        info!(endpoint = %endpoint, today = %today, "Starting reconciliation cycle");

        let listed = self.services.cluster.list_volumes(&endpoint).await;
        let inventory = match listed {
            Ok(inventory) => {
                self.session.record_success();
                inventory
            }
            Err(e) => return self.inventory_failed(endpoint, e).await,
        };
        debug!(volumes = inventory.len(), "Fetched inventory");

        let cluster = self.services.cluster.as_ref();
        let reloaded = self.session.config_reloaded();
        let engine = ReconciliationEngine::new(cluster, self.config.manager.rest_throttle);
        let batch = engine
            .prepare(&mut self.session, &self.config.groups, &inventory, reloaded, today)
            .await;

        let executor = ActionExecutor::new(
            cluster,
            self.services.fs.as_ref(),
            self.services.acl.as_ref(),
            RetryPolicy::with_max_attempts(self.config.manager.fs_action_attempts),
        );
        let report = executor.execute(&mut self.session, &batch).await;
        self.session.clear_reload();

        let elapsed = started.elapsed();
        info!(
            planned = batch.len(),
            failed = report.failed,
            elapsed_ms = elapsed.as_millis(),
            "Finished reconciliation cycle"
        );
        CycleReport::Reconciled {
            planned: batch.len(),
            report,
            elapsed,
        }
    }

    async fn inventory_failed(&mut self, endpoint: String, e: ClusterError) -> CycleReport {
        if !e.requires_failover() {
            warn!(endpoint = %endpoint, error = %e, "Inventory rejected, skipping cycle");
            return CycleReport::Skipped {
                reason: e.to_string(),
            };
        }

        let failure = ControlError::Transport {
            endpoint,
            source: e,
        };
        error!(error = %failure, "Inventory fetch failed, skipping cycle");

        let outcome = self.session.record_transport_failure();
        if outcome.threshold_reached {
            alarm::raise(
                self.services.cluster.as_ref(),
                &self.session,
                INVENTORY_ALARM,
            )
            .await;
        }

        CycleReport::Skipped {
            reason: failure.to_string(),
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown is observed between cycles and during sleeps; a running
    /// cycle always completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            endpoints = ?self.config.manager.endpoints(),
            "Starting control loop"
        );
        let mut pause = Duration::ZERO;

        loop {
            // Cycle is only entered from a state that just checked for shutdown
            if self.state != LoopState::Cycle
                && !lifecycle::is_terminal(self.state)
                && *shutdown.borrow()
            {
                self.transition(LoopState::ShuttingDown);
            }

            match self.state {
                LoopState::Unauthenticated => match self.login().await {
                    Ok(()) => self.transition(LoopState::Authenticated),
                    Err(e) => {
                        if e.is_retriable() {
                            warn!(error = %e, "Login failed, retrying after one interval");
                        } else {
                            error!(
                                error = %e,
                                "Login needs operator action, retrying after one interval"
                            );
                        }
                        pause = self.config.manager.loop_interval;
                        self.transition(LoopState::Sleeping);
                    }
                },
                LoopState::Authenticated => self.transition(LoopState::Cycle),
                LoopState::Cycle => {
                    let started = Instant::now();
                    self.run_cycle(Local::now().date_naive()).await;
                    pause = self
                        .config
                        .manager
                        .loop_interval
                        .saturating_sub(started.elapsed());
                    self.transition(LoopState::Sleeping);
                }
                LoopState::Sleeping => {
                    if sleep_or_shutdown(pause, &mut shutdown).await {
                        self.transition(LoopState::ShuttingDown);
                    } else if self.credential_valid() {
                        self.transition(LoopState::Cycle);
                    } else {
                        if let Some(expired_at) = self.session.credential_expiry() {
                            info!(expired_at = %expired_at, "Credential expired, logging in again");
                            self.session.clear_credential();
                        }
                        self.transition(LoopState::Unauthenticated);
                    }
                }
                LoopState::ShuttingDown => break,
            }
        }

        info!("Control loop stopped");
    }
}

/// Sleep for `pause` unless shutdown is requested first. Returns true on
/// shutdown.
async fn sleep_or_shutdown(pause: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(pause) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
