//! On-disk configuration documents and their validation.
//!
//! Documents are deserialized leniently (every field optional) and then
//! validated into the strongly-typed records in [`crate::types`], so a single
//! pass can report every problem in a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use tracing::warn;
use volkeep_core::{
    AccessPolicy, AccountingEntityType, CreationInterval, CredentialRef, FsPermission,
    ReplicationType, VolumeProperties,
};

use crate::directory::DirectoryService;
use crate::error::{ConfigError, Result};
use crate::types::{GroupSpec, ManagerConfig};

/// Minimum time between cycle starts.
pub const MIN_LOOP_INTERVAL: Duration = Duration::from_secs(10);

/// Name of the group directory when none is configured.
pub const DEFAULT_GROUPS_SUBDIR: &str = "vg.d";

/// A volume group definition as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDocument {
    /// Group name.
    pub name: Option<String>,
    /// Cluster name.
    pub cluster: Option<String>,
    /// strftime pattern for mount paths.
    pub path_format: Option<String>,
    /// Minimum replication, default 2.
    pub min_replication: Option<i64>,
    /// Replication, default 3.
    pub replication: Option<i64>,
    /// `high_throughput` (default) or `low_latency`.
    pub replication_type: Option<String>,
    /// Mount directory owner.
    pub owner: Option<String>,
    /// Mount directory group.
    pub group: Option<String>,
    /// Octal permission, default `755`.
    pub permission: Option<String>,
    /// Accounting entity.
    pub ae: Option<String>,
    /// Accounting entity type, 0 (user, default) or 1 (group).
    pub ae_type: Option<i64>,
    /// Enable whole-volume access expressions.
    #[serde(default)]
    pub ace_enabled: bool,
    /// Read access expression.
    pub read_ace: Option<String>,
    /// Write access expression.
    pub write_ace: Option<String>,
    /// Placement topology.
    pub topology: Option<String>,
    /// Snapshot schedule id, default 0.
    pub schedule: Option<i64>,
    /// `day`, `month`, `year` or `none`.
    pub interval: Option<String>,
    /// Past periods kept.
    pub retention: Option<i64>,
    /// Future periods created.
    pub ahead: Option<i64>,
}

impl GroupDocument {
    /// Validate the document into a [`GroupSpec`].
    ///
    /// # Errors
    ///
    /// Returns every validation failure found, so the caller can report
    /// them together.
    pub fn validate(
        &self,
        directory: &dyn DirectoryService,
    ) -> std::result::Result<GroupSpec, Vec<String>> {
        let mut errors = Vec::new();

        let name = required(self.name.as_ref(), "name", &mut errors);
        let cluster = required(self.cluster.as_ref(), "cluster", &mut errors);
        let path_format = required(self.path_format.as_ref(), "path_format", &mut errors);
        if let Some(format) = &path_format {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                errors.push(format!("path_format '{format}' is not a valid date pattern"));
            }
        }

        let min_replication = count(self.min_replication, Some(2), "min_replication", 1, &mut errors);
        let replication = count(self.replication, Some(3), "replication", 1, &mut errors);
        let replication_type = match self.replication_type.as_deref() {
            None => Some(ReplicationType::default()),
            Some(raw) => raw
                .parse::<ReplicationType>()
                .map_err(|e| errors.push(e.to_string()))
                .ok(),
        };

        let owner = required(self.owner.as_ref(), "owner", &mut errors);
        if let Some(owner) = &owner {
            if !directory.user_exists(owner) {
                errors.push(format!("owner '{owner}' does not exist"));
            }
        }
        let group = required(self.group.as_ref(), "group", &mut errors);
        if let Some(group) = &group {
            if !directory.group_exists(group) {
                errors.push(format!("group '{group}' does not exist"));
            }
        }
        let permission = FsPermission::from_octal(self.permission.as_deref().unwrap_or("755"))
            .map_err(|e| errors.push(e.to_string()))
            .ok();

        let ae = required(self.ae.as_ref(), "ae", &mut errors);
        let ae_type = match self.ae_type.unwrap_or(0) {
            code @ 0..=1 => AccountingEntityType::try_from(u8::from(code == 1)).ok(),
            code => {
                errors.push(format!("ae_type must be 0 or 1, got {code}"));
                None
            }
        };

        let access_policy = if self.ace_enabled {
            let read = required(self.read_ace.as_ref(), "read_ace", &mut errors);
            let write = required(self.write_ace.as_ref(), "write_ace", &mut errors);
            read.zip(write).map(|(r, w)| AccessPolicy::new(r, w))
        } else {
            None
        };

        let topology = required(self.topology.as_ref(), "topology", &mut errors);
        let schedule = count(self.schedule, Some(0), "schedule", 0, &mut errors);

        let interval = match self.interval.as_deref() {
            None => {
                errors.push("interval is required".to_string());
                None
            }
            Some(raw) => raw
                .parse::<CreationInterval>()
                .map_err(|e| errors.push(e.to_string()))
                .ok(),
        };
        let retention = count(self.retention, None, "retention", 0, &mut errors);
        let ahead = count(self.ahead, None, "ahead", 0, &mut errors);
        if interval == Some(CreationInterval::None)
            && (retention.unwrap_or(0) != 0 || ahead.unwrap_or(0) != 0)
        {
            errors.push("interval 'none' requires retention and ahead to be 0".to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        // Every field above pushed an error when it came back empty.
        match (
            name,
            cluster,
            path_format,
            owner,
            group,
            permission,
            ae,
            ae_type,
            topology,
            schedule,
            replication,
            min_replication,
            replication_type,
            interval,
            retention,
            ahead,
        ) {
            (
                Some(name),
                Some(cluster),
                Some(path_format),
                Some(owner),
                Some(group),
                Some(permission),
                Some(ae),
                Some(ae_type),
                Some(topology),
                Some(schedule),
                Some(replication),
                Some(min_replication),
                Some(replication_type),
                Some(interval),
                Some(retention),
                Some(ahead),
            ) => Ok(GroupSpec {
                name,
                cluster,
                path_format,
                properties: VolumeProperties {
                    owner,
                    group,
                    permission,
                    ae,
                    ae_type,
                    topology,
                    schedule,
                    replication,
                    min_replication,
                    replication_type,
                    access_policy,
                },
                interval,
                retention,
                ahead,
            }),
            _ => Err(vec!["incomplete group definition".to_string()]),
        }
    }
}

fn required(value: Option<&String>, field: &str, errors: &mut Vec<String>) -> Option<String> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.push(format!("{field} is required"));
            None
        }
    }
}

fn count(
    value: Option<i64>,
    default: Option<i64>,
    field: &str,
    min: i64,
    errors: &mut Vec<String>,
) -> Option<u32> {
    let Some(value) = value.or(default) else {
        errors.push(format!("{field} is required"));
        return None;
    };
    if value < min {
        errors.push(format!("{field} must be at least {min}, got {value}"));
        return None;
    }
    u32::try_from(value)
        .map_err(|_| errors.push(format!("{field} is too large: {value}")))
        .ok()
}

/// Global manager settings as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerDocument {
    /// REST node host names.
    #[serde(default)]
    pub rest_nodes: Vec<String>,
    /// REST port.
    #[serde(default = "ManagerDocument::default_rest_port")]
    pub rest_port: u16,
    /// Kerberos principal.
    #[serde(default)]
    pub principal: String,
    /// Keytab path.
    #[serde(default)]
    pub keytab: String,
    /// Loop interval in milliseconds.
    #[serde(default = "ManagerDocument::default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    /// Group definition directory; defaults to `vg.d` next to the manager file.
    #[serde(default)]
    pub groups_dir: Option<PathBuf>,
    /// Attempts for retried filesystem actions.
    #[serde(default = "ManagerDocument::default_fs_action_attempts")]
    pub fs_action_attempts: i64,
    /// Pause before each access policy read-back, in milliseconds.
    #[serde(default)]
    pub rest_throttle_ms: i64,
    /// Consecutive inventory failures before alarming.
    #[serde(default = "ManagerDocument::default_failure_alarm_threshold")]
    pub failure_alarm_threshold: u32,
    /// Alarm entity; defaults to the local host name.
    #[serde(default)]
    pub alarm_entity: Option<String>,
    /// Accept self-signed REST certificates.
    #[serde(default)]
    pub tls_accept_invalid_certs: bool,
    /// REST basic auth user.
    #[serde(default)]
    pub rest_user: Option<String>,
    /// REST basic auth password.
    #[serde(default)]
    pub rest_password: Option<String>,
    /// Path of the `hadoop` command.
    #[serde(default = "ManagerDocument::default_hadoop_bin")]
    pub hadoop_bin: PathBuf,
    /// Service ticket lifetime in seconds.
    #[serde(default = "ManagerDocument::default_ticket_lifetime_secs")]
    pub ticket_lifetime_secs: u64,
}

impl ManagerDocument {
    const fn default_rest_port() -> u16 {
        8443
    }

    const fn default_loop_interval_ms() -> u64 {
        60_000
    }

    const fn default_fs_action_attempts() -> i64 {
        3
    }

    const fn default_failure_alarm_threshold() -> u32 {
        3
    }

    fn default_hadoop_bin() -> PathBuf {
        PathBuf::from("hadoop")
    }

    const fn default_ticket_lifetime_secs() -> u64 {
        10 * 60 * 60
    }

    /// Validate the document, resolving relative paths against `conf_dir`.
    ///
    /// Out-of-range tunables are clamped with a warning; missing mandatory
    /// settings are errors.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidManager` listing every missing setting.
    pub fn into_config(self, conf_dir: &Path) -> Result<ManagerConfig> {
        let mut errors = Vec::new();

        let rest_nodes: Vec<String> = self
            .rest_nodes
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(ToString::to_string)
            .collect();
        if rest_nodes.is_empty() {
            errors.push("rest_nodes is required");
        }
        if self.principal.trim().is_empty() {
            errors.push("principal is required");
        }
        if self.keytab.trim().is_empty() {
            errors.push("keytab is required");
        }
        if !errors.is_empty() {
            return Err(ConfigError::InvalidManager(errors.join(", ")));
        }

        let mut loop_interval = Duration::from_millis(self.loop_interval_ms);
        if loop_interval < MIN_LOOP_INTERVAL {
            warn!(
                configured_ms = self.loop_interval_ms,
                minimum_ms = MIN_LOOP_INTERVAL.as_millis(),
                "Loop interval below minimum, using minimum"
            );
            loop_interval = MIN_LOOP_INTERVAL;
        }

        let fs_action_attempts = if self.fs_action_attempts < 1 {
            warn!(
                configured = self.fs_action_attempts,
                "fs_action_attempts below 1, using 1"
            );
            1
        } else {
            u32::try_from(self.fs_action_attempts).unwrap_or(u32::MAX)
        };

        let rest_throttle = if self.rest_throttle_ms < 0 {
            warn!(
                configured_ms = self.rest_throttle_ms,
                "Negative REST throttling interval, disabling throttling"
            );
            Duration::ZERO
        } else {
            Duration::from_millis(self.rest_throttle_ms.unsigned_abs())
        };

        let groups_dir = match self.groups_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => conf_dir.join(dir),
            None => conf_dir.join(DEFAULT_GROUPS_SUBDIR),
        };

        Ok(ManagerConfig {
            rest_nodes,
            rest_port: self.rest_port,
            credential: CredentialRef {
                principal: self.principal.trim().to_string(),
                keytab: PathBuf::from(self.keytab.trim()),
            },
            loop_interval,
            groups_dir,
            fs_action_attempts,
            rest_throttle,
            failure_alarm_threshold: self.failure_alarm_threshold.max(1),
            alarm_entity: self.alarm_entity.unwrap_or_else(local_hostname),
            tls_accept_invalid_certs: self.tls_accept_invalid_certs,
            rest_user: self.rest_user,
            rest_password: self.rest_password,
            hadoop_bin: self.hadoop_bin,
            ticket_lifetime: Duration::from_secs(self.ticket_lifetime_secs),
        })
    }
}

fn local_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    match std::fs::read_to_string("/etc/hostname") {
        Ok(name) => name.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "Unable to determine host name, alarms will be raised cluster-wide");
            String::new()
        }
    }
}
