//! Volume lifecycle reconciliation for volkeep.
//!
//! This crate keeps a storage cluster's time-partitioned volumes in line
//! with the configured volume groups: it creates volumes for current and
//! upcoming periods, removes volumes that fell out of their retention
//! window and reapplies access expressions after configuration changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ControlLoop                           │
//! │   Unauthenticated ─▶ Authenticated ─▶ Cycle ◀─▶ Sleeping     │
//! └─────────────────────────────────────────────────────────────┘
//!        │ reload            │ inventory           │ session
//!        ▼                   ▼                     ▼
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ ConfigStore │   │ReconciliationEng.│──▶│  ActionExecutor  │
//! └─────────────┘   │  ┌────────────┐  │   │ purge → create → │
//!                   │  │ schedule   │  │   │ ace_mod          │
//!                   │  └────────────┘  │   └────────┬─────────┘
//!                   └────────┬─────────┘            │
//!                            ▼                      ▼
//!                   ┌──────────────────────────────────────────┐
//!                   │  ClusterApi / FsService / AclService     │
//!                   └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use volkeep_auth::KinitAuthProvider;
//! use volkeep_cluster::{HadoopCli, RestClientConfig, RestClusterClient};
//! use volkeep_config::{DirConfigStore, SystemDirectory};
//! use volkeep_control::{Collaborators, ControlLoop};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hadoop = Arc::new(HadoopCli::new("hadoop"));
//! let services = Collaborators {
//!     store: Arc::new(DirConfigStore::new(
//!         "/opt/volkeep/conf",
//!         Arc::new(SystemDirectory::new()),
//!     )),
//!     cluster: Arc::new(RestClusterClient::new(RestClientConfig::default())?),
//!     fs: hadoop.clone(),
//!     acl: hadoop,
//!     auth: Arc::new(KinitAuthProvider::new(std::time::Duration::from_secs(36_000))),
//! };
//!
//! let mut control = ControlLoop::start(services)?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! control.run(shutdown_rx).await;
//! # Ok(())
//! # }
//! ```
//!
//! The pure parts ([`schedule`] and [`reconcile::classify`]) can be used
//! on their own to preview what a configuration would do.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod alarm;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod reconcile;
pub mod retry;
pub mod schedule;
pub mod service;
pub mod session;
pub mod types;

pub use error::{ControlError, Result};
pub use executor::ActionExecutor;
pub use lifecycle::LoopState;
pub use reconcile::{Disposition, ReconciliationEngine};
pub use retry::{retry_fixed, RetryPolicy};
pub use schedule::{generate_suffixes, target_set, TargetSet};
pub use service::{Collaborators, ControlLoop, INVENTORY_ALARM};
pub use session::{FailoverOutcome, Session};
pub use types::{ActionBatch, CycleReport, ExecutionReport};
