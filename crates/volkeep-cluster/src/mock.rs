//! In-memory cluster for testing without a real cluster.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use volkeep_core::{AccessPolicy, FsPermission, VolumeInstance};

use crate::error::{ClusterError, Result};
use crate::{AclService, ClusterApi, FsService};

/// A recorded cluster API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    /// Inventory listing.
    List {
        /// Endpoint called.
        endpoint: String,
    },
    /// Volume creation.
    Create {
        /// Endpoint called.
        endpoint: String,
        /// Volume name.
        name: String,
    },
    /// Volume removal.
    Remove {
        /// Endpoint called.
        endpoint: String,
        /// Volume name.
        name: String,
    },
    /// Access policy update.
    SetPolicy {
        /// Endpoint called.
        endpoint: String,
        /// Volume name.
        name: String,
    },
    /// Access policy read-back.
    GetPolicy {
        /// Endpoint called.
        endpoint: String,
        /// Volume name.
        name: String,
    },
    /// Alarm.
    Alarm {
        /// Endpoint called.
        endpoint: String,
        /// Alarm description.
        description: String,
    },
}

#[derive(Debug, Default)]
struct ClusterState {
    volumes: BTreeMap<String, MockVolume>,
    calls: Vec<ClusterCall>,
    down_endpoints: HashSet<String>,
    rejected: HashSet<(&'static str, String)>,
}

#[derive(Debug, Clone)]
struct MockVolume {
    mount_path: String,
    policy: Option<AccessPolicy>,
}

/// A mock cluster that stores volumes in memory.
///
/// Endpoints marked down fail every call with a transport error; individual
/// calls can be rejected with an API error per volume name.
#[derive(Debug, Default)]
pub struct MockCluster {
    state: Mutex<ClusterState>,
}

impl MockCluster {
    /// Create an empty mock cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing volume.
    pub fn add_volume(&self, name: &str, mount_path: &str) {
        self.state.lock().volumes.insert(
            name.to_string(),
            MockVolume {
                mount_path: mount_path.to_string(),
                policy: None,
            },
        );
    }

    /// Set the access policy the cluster reports for a volume.
    pub fn set_policy(&self, name: &str, policy: AccessPolicy) {
        if let Some(volume) = self.state.lock().volumes.get_mut(name) {
            volume.policy = Some(policy);
        }
    }

    /// The access policy currently applied to a volume.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<AccessPolicy> {
        self.state
            .lock()
            .volumes
            .get(name)
            .and_then(|v| v.policy.clone())
    }

    /// Make every call against `endpoint` fail with a transport error.
    pub fn set_endpoint_down(&self, endpoint: &str, down: bool) {
        let mut state = self.state.lock();
        if down {
            state.down_endpoints.insert(endpoint.to_string());
        } else {
            state.down_endpoints.remove(endpoint);
        }
    }

    /// Reject calls of kind `call` (`create`, `remove`, `set_policy`,
    /// `get_policy`) for `name` with an API error. `list` and `alarm` calls
    /// are rejected with an empty name.
    pub fn reject(&self, call: &'static str, name: &str) {
        self.state.lock().rejected.insert((call, name.to_string()));
    }

    /// Names of all volumes, sorted.
    #[must_use]
    pub fn volume_names(&self) -> Vec<String> {
        self.state.lock().volumes.keys().cloned().collect()
    }

    /// Every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state.lock().calls.clone()
    }

    /// Descriptions of every alarm raised so far.
    #[must_use]
    pub fn alarms(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ClusterCall::Alarm { description, .. } => Some(description.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: ClusterCall, kind: &'static str, name: &str, endpoint: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.down_endpoints.contains(endpoint) {
            return Err(ClusterError::Transport(format!("{endpoint}: connection refused")));
        }
        if state.rejected.contains(&(kind, name.to_string())) {
            return Err(ClusterError::Api {
                call: kind.to_string(),
                message: format!("{name} rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn list_volumes(&self, endpoint: &str) -> Result<Vec<VolumeInstance>> {
        self.record(
            ClusterCall::List {
                endpoint: endpoint.to_string(),
            },
            "list",
            "",
            endpoint,
        )?;
        Ok(self
            .state
            .lock()
            .volumes
            .iter()
            .map(|(name, v)| VolumeInstance::observed(name.clone(), v.mount_path.clone()))
            .collect())
    }

    async fn create_volume(&self, endpoint: &str, volume: &VolumeInstance) -> Result<()> {
        self.record(
            ClusterCall::Create {
                endpoint: endpoint.to_string(),
                name: volume.name.clone(),
            },
            "create",
            &volume.name,
            endpoint,
        )?;
        let mut state = self.state.lock();
        if state.volumes.contains_key(&volume.name) {
            return Err(ClusterError::Api {
                call: "create".into(),
                message: format!("volume {} exists", volume.name),
            });
        }
        state.volumes.insert(
            volume.name.clone(),
            MockVolume {
                mount_path: volume.mount_path.clone(),
                policy: volume.access_policy().cloned(),
            },
        );
        Ok(())
    }

    async fn remove_volume(&self, endpoint: &str, name: &str) -> Result<()> {
        self.record(
            ClusterCall::Remove {
                endpoint: endpoint.to_string(),
                name: name.to_string(),
            },
            "remove",
            name,
            endpoint,
        )?;
        self.state.lock().volumes.remove(name);
        Ok(())
    }

    async fn set_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
        policy: &AccessPolicy,
    ) -> Result<()> {
        self.record(
            ClusterCall::SetPolicy {
                endpoint: endpoint.to_string(),
                name: name.to_string(),
            },
            "set_policy",
            name,
            endpoint,
        )?;
        match self.state.lock().volumes.get_mut(name) {
            Some(volume) => {
                volume.policy = Some(policy.clone());
                Ok(())
            }
            None => Err(ClusterError::Api {
                call: "set_policy".into(),
                message: format!("no volume {name}"),
            }),
        }
    }

    async fn get_volume_access_policy(
        &self,
        endpoint: &str,
        name: &str,
    ) -> Result<Option<AccessPolicy>> {
        self.record(
            ClusterCall::GetPolicy {
                endpoint: endpoint.to_string(),
                name: name.to_string(),
            },
            "get_policy",
            name,
            endpoint,
        )?;
        match self.state.lock().volumes.get(name) {
            Some(volume) => Ok(volume.policy.clone()),
            None => Err(ClusterError::Api {
                call: "get_policy".into(),
                message: format!("no volume {name}"),
            }),
        }
    }

    async fn raise_alarm(&self, endpoint: &str, _key: &str, description: &str) -> Result<()> {
        self.record(
            ClusterCall::Alarm {
                endpoint: endpoint.to_string(),
                description: description.to_string(),
            },
            "alarm",
            "",
            endpoint,
        )
    }
}

/// A recorded filesystem or ACL operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsCall {
    /// Directory creation.
    EnsureDirectory(String),
    /// Ownership change.
    SetOwner(String),
    /// Permission change.
    SetPermission(String),
    /// Public grant application.
    PublicGrants(String),
}

/// Mock filesystem whose operations can be made to fail a number of times.
#[derive(Debug, Default)]
pub struct MockFs {
    calls: Mutex<Vec<FsCall>>,
    failures: Mutex<HashMap<&'static str, u32>>,
}

impl MockFs {
    /// Create a mock filesystem where every operation succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` (`ensure_directory`, `set_owner`,
    /// `set_permission`, `public_grants`) fail.
    pub fn fail(&self, op: &'static str, times: u32) {
        self.failures.lock().insert(op, times);
    }

    /// Every operation attempted so far.
    #[must_use]
    pub fn calls(&self) -> Vec<FsCall> {
        self.calls.lock().clone()
    }

    fn attempt(&self, op: &'static str, call: FsCall) -> Result<()> {
        self.calls.lock().push(call);
        let mut failures = self.failures.lock();
        match failures.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ClusterError::Command {
                    command: op.to_string(),
                    message: "injected failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl FsService for MockFs {
    async fn ensure_directory(&self, path: &str) -> Result<()> {
        self.attempt("ensure_directory", FsCall::EnsureDirectory(path.to_string()))
    }

    async fn set_owner(&self, path: &str, _owner: &str, _group: &str) -> Result<()> {
        self.attempt("set_owner", FsCall::SetOwner(path.to_string()))
    }

    async fn set_permission(&self, path: &str, _permission: FsPermission) -> Result<()> {
        self.attempt("set_permission", FsCall::SetPermission(path.to_string()))
    }
}

#[async_trait]
impl AclService for MockFs {
    async fn set_path_public_grants(&self, path: &str) -> Result<()> {
        self.attempt("public_grants", FsCall::PublicGrants(path.to_string()))
    }
}
