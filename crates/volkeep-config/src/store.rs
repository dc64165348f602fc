//! File-backed configuration store.
//!
//! Layout of a configuration directory:
//!
//! ```text
//! <conf>/manager.json      global settings
//! <conf>/vg.d/*.json       one volume group per file
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use crate::directory::DirectoryService;
use crate::document::{GroupDocument, ManagerDocument};
use crate::error::{ConfigError, Result, SkippedGroup};
use crate::types::{GroupSpec, LoadedConfig, ManagerConfig};
use crate::ConfigStore;

/// File name of the global settings document.
pub const MANAGER_FILE: &str = "manager.json";

/// Outcome of reading one group definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// The file held a valid definition.
    Loaded(GroupSpec),
    /// The file was rejected.
    Skipped(SkippedGroup),
}

/// Configuration store reading JSON documents from a directory.
#[derive(Clone)]
pub struct DirConfigStore {
    conf_dir: PathBuf,
    directory: Arc<dyn DirectoryService>,
}

impl DirConfigStore {
    /// Create a store rooted at `conf_dir`.
    #[must_use]
    pub fn new(conf_dir: impl Into<PathBuf>, directory: Arc<dyn DirectoryService>) -> Self {
        Self {
            conf_dir: conf_dir.into(),
            directory,
        }
    }

    /// The configuration directory.
    #[must_use]
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    fn manager_path(&self) -> PathBuf {
        self.conf_dir.join(MANAGER_FILE)
    }

    /// Read and validate the global settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparseable or invalid.
    pub fn load_manager(&self) -> Result<ManagerConfig> {
        let path = self.manager_path();
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
        let doc: ManagerDocument =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        doc.into_config(&self.conf_dir)
    }

    /// Read every group definition in `groups_dir`, in file name order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be listed;
    /// problems with individual files are reported as [`GroupOutcome::Skipped`].
    pub fn scan_groups(&self, groups_dir: &Path) -> Result<Vec<(PathBuf, GroupOutcome)>> {
        let files = group_files(groups_dir)?;
        let mut outcomes = Vec::with_capacity(files.len());

        for path in files {
            let outcome = match self.read_group(&path) {
                Ok(spec) => GroupOutcome::Loaded(spec),
                Err(reasons) => GroupOutcome::Skipped(SkippedGroup {
                    path: path.clone(),
                    reasons,
                }),
            };
            outcomes.push((path, outcome));
        }

        Ok(outcomes)
    }

    fn read_group(&self, path: &Path) -> std::result::Result<GroupSpec, Vec<String>> {
        let raw = std::fs::read_to_string(path).map_err(|e| vec![e.to_string()])?;
        let doc: GroupDocument = serde_json::from_str(&raw).map_err(|e| vec![e.to_string()])?;
        doc.validate(self.directory.as_ref())
    }
}

impl std::fmt::Debug for DirConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirConfigStore")
            .field("conf_dir", &self.conf_dir)
            .finish_non_exhaustive()
    }
}

impl ConfigStore for DirConfigStore {
    fn load(&self) -> Result<LoadedConfig> {
        let manager = self.load_manager()?;
        let outcomes = self.scan_groups(&manager.groups_dir)?;

        let mut groups: Vec<GroupSpec> = Vec::new();
        let mut seen = HashSet::new();
        let mut skipped = Vec::new();

        for (path, outcome) in outcomes {
            match outcome {
                GroupOutcome::Loaded(spec) => {
                    if seen.insert(spec.name.clone()) {
                        debug!(group = %spec.name, path = %path.display(), "Loaded volume group");
                        groups.push(spec);
                    } else {
                        warn!(
                            group = %spec.name,
                            path = %path.display(),
                            "Duplicate volume group name, discarding"
                        );
                    }
                }
                GroupOutcome::Skipped(skip) => {
                    for reason in &skip.reasons {
                        error!(path = %skip.path.display(), reason = %reason, "Invalid volume group");
                    }
                    skipped.push(skip);
                }
            }
        }

        if !skipped.is_empty() {
            return Err(ConfigError::InvalidGroups { skipped });
        }

        info!(
            groups = groups.len(),
            groups_dir = %manager.groups_dir.display(),
            "Configuration loaded"
        );

        Ok(LoadedConfig { manager, groups })
    }

    fn changed_since(&self, since: SystemTime) -> Result<bool> {
        let manager_path = self.manager_path();
        if modified(&manager_path)? > since {
            return Ok(true);
        }

        let groups_dir = self.load_manager()?.groups_dir;
        if modified(&groups_dir)? > since {
            return Ok(true);
        }
        for path in group_files(&groups_dir)? {
            if modified(&path)? > since {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ConfigError::io(path, e))
}

fn group_files(groups_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(groups_dir).map_err(|e| ConfigError::io(groups_dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ConfigError::io(groups_dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use std::time::Duration;

    const MANAGER: &str = r#"{
        "rest_nodes": ["node1", "node2"],
        "principal": "mapr/host@REALM",
        "keytab": "/etc/mapr.keytab",
        "alarm_entity": "host1"
    }"#;

    fn group_json(name: &str, interval: &str, retention: u32, ahead: u32) -> String {
        format!(
            r#"{{
                "name": "{name}",
                "cluster": "my.cluster.com",
                "path_format": "/data/{name}/%Y%m%d",
                "owner": "mapr",
                "group": "mapr",
                "ae": "mapr",
                "topology": "/data",
                "interval": "{interval}",
                "retention": {retention},
                "ahead": {ahead}
            }}"#
        )
    }

    fn setup() -> (tempfile::TempDir, DirConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANAGER_FILE), MANAGER).unwrap();
        std::fs::create_dir(dir.path().join("vg.d")).unwrap();
        let store = DirConfigStore::new(
            dir.path(),
            Arc::new(StaticDirectory::new(&["mapr"], &["mapr"])),
        );
        (dir, store)
    }

    #[test]
    fn loads_groups_in_file_order() {
        let (dir, store) = setup();
        let vg = dir.path().join("vg.d");
        std::fs::write(vg.join("b.json"), group_json("monthly", "month", 3, 1)).unwrap();
        std::fs::write(vg.join("a.json"), group_json("daily", "day", 5, 5)).unwrap();
        std::fs::write(vg.join("notes.txt"), "ignored").unwrap();

        let config = store.load().unwrap();
        let names: Vec<_> = config.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["daily", "monthly"]);
        assert_eq!(config.manager.rest_nodes.len(), 2);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let (dir, store) = setup();
        let vg = dir.path().join("vg.d");
        std::fs::write(vg.join("a.json"), group_json("daily", "day", 5, 5)).unwrap();
        std::fs::write(vg.join("b.json"), group_json("daily", "day", 1, 1)).unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].retention, 5);
    }

    #[test]
    fn invalid_group_fails_load() {
        let (dir, store) = setup();
        let vg = dir.path().join("vg.d");
        std::fs::write(vg.join("a.json"), group_json("daily", "day", 5, 5)).unwrap();
        std::fs::write(vg.join("b.json"), group_json("static", "none", 2, 0)).unwrap();
        std::fs::write(vg.join("c.json"), "{ not json").unwrap();

        let outcomes = store.scan_groups(&vg).unwrap();
        assert!(matches!(outcomes[0].1, GroupOutcome::Loaded(_)));
        assert!(matches!(outcomes[1].1, GroupOutcome::Skipped(_)));
        assert!(matches!(outcomes[2].1, GroupOutcome::Skipped(_)));

        match store.load() {
            Err(ConfigError::InvalidGroups { skipped }) => {
                assert_eq!(skipped.len(), 2);
                assert_eq!(skipped[0].path, vg.join("b.json"));
            }
            other => panic!("expected InvalidGroups, got {other:?}"),
        }
    }

    #[test]
    fn missing_manager_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirConfigStore::new(dir.path(), Arc::new(StaticDirectory::default()));
        assert!(matches!(store.load(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn change_detection() {
        let (dir, store) = setup();
        let vg = dir.path().join("vg.d");
        std::fs::write(vg.join("a.json"), group_json("daily", "day", 5, 5)).unwrap();

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert!(!store.changed_since(future).unwrap());

        let past = SystemTime::now() - Duration::from_secs(3600);
        assert!(store.changed_since(past).unwrap());
    }
}
