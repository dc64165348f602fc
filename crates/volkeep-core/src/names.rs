//! Volume naming.
//!
//! Managed volumes are named either after their group alone (`logs`) or after
//! the group followed by an underscore and a fixed-width period suffix
//! (`logs_20240105`). [`ObservedName`] reverses that derivation for names
//! reported by the cluster.

use std::fmt;

/// Derive a volume name from a group name and a period suffix.
///
/// An empty suffix yields the bare group name.
#[must_use]
pub fn volume_name(group: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        group.to_string()
    } else {
        format!("{group}_{suffix}")
    }
}

/// A volume name as reported by the cluster, split into owning group and suffix.
///
/// The group is obtained by stripping a trailing `_<digits>` from the name.
/// Names without such a tail belong to a group of the same name and carry no
/// suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedName {
    name: String,
    split: Option<usize>,
}

impl ObservedName {
    /// Parse an observed volume name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let split = name.rfind('_').filter(|&idx| {
            name[idx + 1..].bytes().all(|b| b.is_ascii_digit())
        });

        Self {
            name: name.to_string(),
            split,
        }
    }

    /// The full observed name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The owning group name.
    #[must_use]
    pub fn group(&self) -> &str {
        match self.split {
            Some(idx) => &self.name[..idx],
            None => &self.name,
        }
    }

    /// The digit suffix following the last underscore, if the name has one.
    ///
    /// A name ending in a bare underscore yields `Some("")`.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.split.map(|idx| &self.name[idx + 1..])
    }

    /// The suffix as a number, for date comparisons.
    ///
    /// Returns `None` when there is no suffix, the suffix is empty, or it
    /// does not fit in a `u64`.
    #[must_use]
    pub fn suffix_value(&self) -> Option<u64> {
        self.suffix()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for ObservedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
