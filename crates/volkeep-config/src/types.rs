//! Validated configuration records.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use volkeep_core::{AccessPolicy, CreationInterval, CredentialRef, VolumeProperties};

/// A validated volume group definition.
///
/// A group describes a family of time-partitioned volumes sharing a naming,
/// placement and retention policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name, also the prefix of every volume name.
    pub name: String,
    /// Cluster the group belongs to.
    pub cluster: String,
    /// strftime pattern for a volume's mount path.
    pub path_format: String,
    /// Attributes copied onto every volume of the group.
    pub properties: VolumeProperties,
    /// Period length.
    pub interval: CreationInterval,
    /// Number of past periods kept; 0 keeps volumes forever.
    pub retention: u32,
    /// Number of future periods created ahead of time.
    pub ahead: u32,
}

impl GroupSpec {
    /// The whole-volume access expressions, if access control is enabled.
    #[must_use]
    pub fn access_policy(&self) -> Option<&AccessPolicy> {
        self.properties.access_policy.as_ref()
    }

    /// Returns true if whole-volume access control is enabled.
    #[must_use]
    pub fn access_policy_enabled(&self) -> bool {
        self.properties.access_policy.is_some()
    }

    /// Returns true if volumes of this group are never purged.
    #[must_use]
    pub const fn keeps_forever(&self) -> bool {
        self.retention == 0
    }
}

/// Validated global manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Cluster REST nodes, in failover order.
    pub rest_nodes: Vec<String>,
    /// REST port shared by all nodes.
    pub rest_port: u16,
    /// Service credential.
    pub credential: CredentialRef,
    /// Target time between cycle starts.
    pub loop_interval: Duration,
    /// Directory holding one group definition per file.
    pub groups_dir: PathBuf,
    /// Attempts for retried filesystem actions, at least 1.
    pub fs_action_attempts: u32,
    /// Pause before each access policy read-back.
    pub rest_throttle: Duration,
    /// Consecutive inventory failures before an alarm is raised.
    pub failure_alarm_threshold: u32,
    /// Entity alarms are raised against; empty raises cluster-wide.
    pub alarm_entity: String,
    /// Accept self-signed REST certificates.
    pub tls_accept_invalid_certs: bool,
    /// REST basic auth user.
    pub rest_user: Option<String>,
    /// REST basic auth password.
    pub rest_password: Option<String>,
    /// Path of the cluster `hadoop` command.
    pub hadoop_bin: PathBuf,
    /// Lifetime of an acquired service ticket.
    pub ticket_lifetime: Duration,
}

impl ManagerConfig {
    /// Base URLs of every REST endpoint, in failover order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<String> {
        self.rest_nodes
            .iter()
            .map(|node| format!("https://{}:{}", node, self.rest_port))
            .collect()
    }
}

/// A complete configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// Global settings.
    pub manager: ManagerConfig,
    /// Volume groups, duplicates removed.
    pub groups: Vec<GroupSpec>,
}
