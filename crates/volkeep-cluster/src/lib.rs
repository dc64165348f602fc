//! Cluster REST, filesystem and ACL clients for volkeep.
//!
//! This crate provides the collaborator traits the reconciler acts through
//! and their production implementations:
//!
//! - [`ClusterApi`]: volume inventory, create/remove, access policies and
//!   alarms, implemented over REST by [`RestClusterClient`]
//! - [`FsService`] and [`AclService`]: mount directory preparation and public
//!   grants, implemented by [`HadoopCli`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Control loop                              │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                                 │
//!                  ▼                                 ▼
//!        ┌──────────────────┐              ┌──────────────────┐
//!        │    ClusterApi    │              │ FsService +      │
//!        │    (trait)       │              │ AclService       │
//!        └────────┬─────────┘              └────────┬─────────┘
//!                 │                                 │
//!        ┌────────▼─────────┐              ┌────────▼─────────┐
//!        │RestClusterClient │              │    HadoopCli     │
//!        └────────┬─────────┘              └────────┬─────────┘
//!                 │ HTTPS (endpoint per call)       │ process
//!                 ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Storage cluster                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature for [`MockCluster`] and [`MockFs`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod hadoop;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod response;
pub mod rest;

use async_trait::async_trait;
use volkeep_core::{AccessPolicy, FsPermission, VolumeInstance};

pub use error::{ClusterError, Result};
pub use hadoop::HadoopCli;
pub use rest::{RestClientConfig, RestClusterClient};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{ClusterCall, FsCall, MockCluster, MockFs};

/// Alarm raised for every volume manager failure.
pub const ALARM_KEY: &str = "NODE_ALARM_SERVICE_VOLUME-MANAGER_DOWN";

/// Rights granted to everyone on a new volume's mount directory.
pub const PUBLIC_GRANTS: [&str; 7] = [
    "readfile",
    "writefile",
    "executefile",
    "readdir",
    "addchild",
    "deletechild",
    "lookupdir",
];

/// Access expression matching every user.
pub const PUBLIC_EXPRESSION: &str = "p";

/// Volume operations against the cluster's management API.
///
/// Every call names the endpoint it is sent to; choosing and rotating
/// endpoints is the caller's job.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every volume on the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or rejects the call.
    async fn list_volumes(&self, endpoint: &str) -> Result<Vec<VolumeInstance>>;

    /// Create a planned volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume carries no properties or the cluster
    /// rejects it.
    async fn create_volume(&self, endpoint: &str, volume: &VolumeInstance) -> Result<()>;

    /// Remove a volume by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or rejects the call.
    async fn remove_volume(&self, endpoint: &str, name: &str) -> Result<()>;

    /// Apply whole-volume access expressions.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or rejects the call.
    async fn set_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
        policy: &AccessPolicy,
    ) -> Result<()>;

    /// Read back the access expressions currently applied to a volume.
    ///
    /// Returns `None` if the volume has no expressions applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, rejects the call or
    /// answers with a malformed body.
    async fn get_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
    ) -> Result<Option<AccessPolicy>>;

    /// Raise a cluster alarm.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or rejects the call.
    async fn raise_alarm(&self, endpoint: &str, key: &str, description: &str) -> Result<()>;
}

/// Filesystem operations on volume mount paths.
#[async_trait]
pub trait FsService: Send + Sync {
    /// Create a directory and its parents if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    async fn ensure_directory(&self, path: &str) -> Result<()>;

    /// Change the owner and group of a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the change fails.
    async fn set_owner(&self, path: &str, owner: &str, group: &str) -> Result<()>;

    /// Change the permission bits of a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the change fails.
    async fn set_permission(&self, path: &str, permission: FsPermission) -> Result<()>;
}

/// Filesystem-level access control entries.
#[async_trait]
pub trait AclService: Send + Sync {
    /// Grant the fixed [`PUBLIC_GRANTS`] rights to everyone on `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entries cannot be set.
    async fn set_path_public_grants(&self, path: &str) -> Result<()>;
}
