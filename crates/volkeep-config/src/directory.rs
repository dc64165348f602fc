//! User and group lookups used while validating group definitions.

use std::path::PathBuf;
use std::process::Command;

use tracing::warn;

/// Exit status of `getent` for a key that is not in the database.
const NOT_FOUND: i32 = 2;

/// Answers whether users and groups exist.
///
/// Only consulted during configuration validation; reconciliation assumes
/// owners and groups were checked at load time.
pub trait DirectoryService: Send + Sync {
    /// Returns true if a user with this name exists.
    fn user_exists(&self, name: &str) -> bool;

    /// Returns true if a group with this name exists.
    fn group_exists(&self, name: &str) -> bool;
}

/// Directory backed by the name service switch through `getent`.
///
/// Users and groups served by LDAP or SSSD are found the same way as local
/// ones.
#[derive(Debug, Clone)]
pub struct SystemDirectory {
    getent_bin: PathBuf,
}

impl SystemDirectory {
    /// Use `getent` from the `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("getent")
    }

    /// Use a specific `getent` executable.
    #[must_use]
    pub fn with_binary(getent_bin: impl Into<PathBuf>) -> Self {
        Self {
            getent_bin: getent_bin.into(),
        }
    }

    fn lookup(&self, database: &str, name: &str) -> bool {
        let output = match Command::new(&self.getent_bin)
            .arg(database)
            .arg(name)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    command = %self.getent_bin.display(),
                    error = %e,
                    "Unable to run getent"
                );
                return false;
            }
        };

        match output.status.code() {
            Some(0) => true,
            Some(NOT_FOUND) => false,
            _ => {
                warn!(
                    database = %database,
                    name = %name,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "getent lookup failed"
                );
                false
            }
        }
    }
}

impl Default for SystemDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryService for SystemDirectory {
    fn user_exists(&self, name: &str) -> bool {
        self.lookup("passwd", name)
    }

    fn group_exists(&self, name: &str) -> bool {
        self.lookup("group", name)
    }
}

/// A fixed in-memory directory for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: std::collections::HashSet<String>,
    groups: std::collections::HashSet<String>,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticDirectory {
    /// Create a directory knowing the given users and groups.
    #[must_use]
    pub fn new(users: &[&str], groups: &[&str]) -> Self {
        Self {
            users: users.iter().map(ToString::to_string).collect(),
            groups: groups.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl DirectoryService for StaticDirectory {
    fn user_exists(&self, name: &str) -> bool {
        self.users.contains(name)
    }

    fn group_exists(&self, name: &str) -> bool {
        self.groups.contains(name)
    }
}
