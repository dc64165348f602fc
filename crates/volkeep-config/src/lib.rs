//! Volume group and manager configuration for volkeep.
//!
//! This crate turns the on-disk configuration directory into validated,
//! strongly-typed records:
//!
//! - [`GroupSpec`]: one family of time-partitioned volumes
//! - [`ManagerConfig`]: endpoints, credentials and loop tunables
//! - [`ConfigStore`]: loading plus change detection for hot reload
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Control loop   │────▶│   ConfigStore    │
//! │                  │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  DirConfigStore  │
//!                          │  (JSON files)    │
//!                          └────────┬─────────┘
//!                                   │ validate
//!                          ┌────────▼─────────┐
//!                          │ DirectoryService │
//!                          │ (users, groups)  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use volkeep_config::{ConfigStore, DirConfigStore, SystemDirectory};
//!
//! let store = DirConfigStore::new("/opt/volkeep/conf", Arc::new(SystemDirectory::new()));
//! let config = store.load().unwrap();
//! for group in &config.groups {
//!     println!("{} keeps {} periods", group.name, group.retention);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod directory;
pub mod document;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod store;
pub mod types;

use std::time::SystemTime;

pub use directory::{DirectoryService, SystemDirectory};
pub use document::{GroupDocument, ManagerDocument, MIN_LOOP_INTERVAL};
pub use error::{ConfigError, Result, SkippedGroup};
pub use store::{DirConfigStore, GroupOutcome};
pub use types::{GroupSpec, LoadedConfig, ManagerConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use directory::StaticDirectory;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockConfigStore;

/// Source of the current configuration.
pub trait ConfigStore: Send + Sync {
    /// Load and validate the full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any document is unreadable or invalid; callers
    /// keep their previous configuration in that case.
    fn load(&self) -> Result<LoadedConfig>;

    /// Returns true if the configuration changed after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration files cannot be inspected.
    fn changed_since(&self, since: SystemTime) -> Result<bool>;
}
