//! Filesystem and ACL operations through the cluster's `hadoop` command.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use volkeep_core::FsPermission;

use crate::error::{ClusterError, Result};
use crate::{AclService, FsService, PUBLIC_EXPRESSION, PUBLIC_GRANTS};

/// Runs `hadoop fs` and `hadoop mfs` subcommands.
#[derive(Debug, Clone)]
pub struct HadoopCli {
    bin: PathBuf,
}

impl HadoopCli {
    /// Create a wrapper around the given `hadoop` executable.
    #[must_use]
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: Vec<String>) -> Result<()> {
        let command = format!("{} {}", self.bin.display(), args.join(" "));
        debug!(command = %command, "Running cluster filesystem command");

        let output = Command::new(&self.bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| ClusterError::Command {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ClusterError::Command {
                command,
                message: format!("{}: {stderr}", output.status),
            })
        }
    }
}

fn mkdir_args(path: &str) -> Vec<String> {
    ["fs", "-mkdir", "-p", path].map(String::from).to_vec()
}

fn chown_args(path: &str, owner: &str, group: &str) -> Vec<String> {
    vec![
        "fs".into(),
        "-chown".into(),
        format!("{owner}:{group}"),
        path.into(),
    ]
}

fn chmod_args(path: &str, permission: FsPermission) -> Vec<String> {
    vec![
        "fs".into(),
        "-chmod".into(),
        permission.to_string(),
        path.into(),
    ]
}

fn setace_args(path: &str) -> Vec<String> {
    let mut args = vec!["mfs".to_string(), "-setace".to_string()];
    for grant in PUBLIC_GRANTS {
        args.push(format!("-{grant}"));
        args.push(PUBLIC_EXPRESSION.to_string());
    }
    args.push(path.to_string());
    args
}

#[async_trait]
impl FsService for HadoopCli {
    async fn ensure_directory(&self, path: &str) -> Result<()> {
        self.run(mkdir_args(path)).await
    }

    async fn set_owner(&self, path: &str, owner: &str, group: &str) -> Result<()> {
        self.run(chown_args(path, owner, group)).await
    }

    async fn set_permission(&self, path: &str, permission: FsPermission) -> Result<()> {
        self.run(chmod_args(path, permission)).await
    }
}

#[async_trait]
impl AclService for HadoopCli {
    async fn set_path_public_grants(&self, path: &str) -> Result<()> {
        self.run(setace_args(path)).await
    }
}
