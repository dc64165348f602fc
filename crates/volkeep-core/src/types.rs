//! Volume value types shared between configuration, cluster access and
//! reconciliation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How often a group rolls over to a new volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationInterval {
    /// One volume per calendar day, suffix `YYYYMMDD`.
    Day,
    /// One volume per calendar month, suffix `YYYYMM01`.
    Month,
    /// One volume per calendar year, suffix `YYYY0101`.
    Year,
    /// A single static volume named after the group.
    None,
}

impl CreationInterval {
    /// The strftime pattern used to render a period suffix, or `None` for
    /// static groups.
    ///
    /// Every pattern renders to eight zero-padded digits so numeric and
    /// lexicographic order agree.
    #[must_use]
    pub const fn suffix_format(self) -> Option<&'static str> {
        match self {
            Self::Day => Some("%Y%m%d"),
            Self::Month => Some("%Y%m01"),
            Self::Year => Some("%Y0101"),
            Self::None => None,
        }
    }

    /// The lowercase configuration keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CreationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreationInterval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "none" => Ok(Self::None),
            _ => Err(CoreError::UnknownInterval(s.to_string())),
        }
    }
}

/// Replication mode requested at volume creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationType {
    /// Chain replication, optimised for throughput.
    #[default]
    HighThroughput,
    /// Star replication, optimised for latency.
    LowLatency,
}

impl ReplicationType {
    /// The keyword used by the cluster API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighThroughput => "high_throughput",
            Self::LowLatency => "low_latency",
        }
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplicationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_throughput" => Ok(Self::HighThroughput),
            "low_latency" => Ok(Self::LowLatency),
            _ => Err(CoreError::UnknownReplicationType(s.to_string())),
        }
    }
}

/// Kind of entity that volume usage is accounted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccountingEntityType {
    /// Accounted against a user.
    #[default]
    User,
    /// Accounted against a group.
    Group,
}

impl AccountingEntityType {
    /// The numeric code used by the cluster API.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Group => 1,
        }
    }
}

impl TryFrom<u8> for AccountingEntityType {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::User),
            1 => Ok(Self::Group),
            other => Err(CoreError::InvalidAccountingEntityType(other)),
        }
    }
}

impl From<AccountingEntityType> for u8 {
    fn from(value: AccountingEntityType) -> Self {
        value.code()
    }
}

/// Unix permission bits for a volume's mount directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FsPermission(u32);

impl FsPermission {
    /// Parse an octal mode such as `755` or `0750`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidPermission` for non-octal input or modes
    /// above `7777`.
    pub fn from_octal(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidPermission(s.to_string()));
        }
        let mode = u32::from_str_radix(trimmed, 8)
            .map_err(|_| CoreError::InvalidPermission(s.to_string()))?;
        if mode > 0o7777 {
            return Err(CoreError::InvalidPermission(s.to_string()));
        }
        Ok(Self(mode))
    }

    /// The numeric mode.
    #[must_use]
    pub const fn mode(self) -> u32 {
        self.0
    }
}

impl Default for FsPermission {
    fn default() -> Self {
        Self(0o755)
    }
}

impl fmt::Debug for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FsPermission({:o})", self.0)
    }
}

impl fmt::Display for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

impl TryFrom<String> for FsPermission {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_octal(&value)
    }
}

impl From<FsPermission> for String {
    fn from(value: FsPermission) -> Self {
        value.to_string()
    }
}

/// Whole-volume read and write access control expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Expression governing read access.
    pub read: String,
    /// Expression governing write access.
    pub write: String,
}

impl AccessPolicy {
    /// Create a new access policy.
    #[must_use]
    pub fn new(read: impl Into<String>, write: impl Into<String>) -> Self {
        Self {
            read: read.into(),
            write: write.into(),
        }
    }

    /// Compare two policies ignoring all whitespace.
    ///
    /// The comparison is case-sensitive: `"u:a & g:b"` matches `"u:a&g:b"`
    /// but not `"U:a&g:b"`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        same_expression(&self.read, &other.read) && same_expression(&self.write, &other.write)
    }
}

fn same_expression(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

/// Creation-time attributes copied from a group onto each of its volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeProperties {
    /// Owning user of the mount directory.
    pub owner: String,
    /// Owning group of the mount directory.
    pub group: String,
    /// Permission bits of the mount directory.
    pub permission: FsPermission,
    /// Accounting entity name.
    pub ae: String,
    /// Accounting entity kind.
    pub ae_type: AccountingEntityType,
    /// Topology the volume is placed in.
    pub topology: String,
    /// Snapshot schedule id; 0 disables snapshots.
    pub schedule: u32,
    /// Replication factor.
    pub replication: u32,
    /// Minimum replication factor.
    pub min_replication: u32,
    /// Replication mode.
    pub replication_type: ReplicationType,
    /// Whole-volume access expressions, when access control is enabled.
    pub access_policy: Option<AccessPolicy>,
}

/// A single volume, either planned from a group or observed on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInstance {
    /// Volume name.
    pub name: String,
    /// Absolute mount path inside the cluster namespace.
    pub mount_path: String,
    /// Group attributes snapshotted at construction. Observed volumes carry none.
    pub properties: Option<VolumeProperties>,
}

impl VolumeInstance {
    /// Create a planned volume carrying a snapshot of its group's attributes.
    #[must_use]
    pub fn planned(
        name: impl Into<String>,
        mount_path: impl Into<String>,
        properties: VolumeProperties,
    ) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            properties: Some(properties),
        }
    }

    /// Create a volume as reported by the cluster inventory.
    #[must_use]
    pub fn observed(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            properties: None,
        }
    }

    /// The configured access policy, if any.
    #[must_use]
    pub fn access_policy(&self) -> Option<&AccessPolicy> {
        self.properties.as_ref().and_then(|p| p.access_policy.as_ref())
    }
}

/// Reference to the service credential used to log in to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    /// Kerberos principal.
    pub principal: String,
    /// Path to the keytab holding the principal's key.
    pub keytab: PathBuf,
}
