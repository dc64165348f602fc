//! Best-effort execution of an action batch.
//!
//! Items are processed purge first, then create, then access policy
//! updates. A failed item is logged and alarmed and never stops its
//! siblings; only the filesystem steps of a create are retried.

use std::path::Path;

use tracing::{error, info};
use volkeep_cluster::{AclService, ClusterApi, FsService};
use volkeep_core::VolumeInstance;

use crate::alarm;
use crate::error::ControlError;
use crate::retry::{retry_fixed, RetryPolicy};
use crate::session::Session;
use crate::types::{ActionBatch, ExecutionReport};

/// Applies action batches through the cluster collaborators.
pub struct ActionExecutor<'a> {
    cluster: &'a dyn ClusterApi,
    fs: &'a dyn FsService,
    acl: &'a dyn AclService,
    retry: RetryPolicy,
}

/// How far a create item got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateOutcome {
    NotCreated,
    Incomplete,
    Complete,
}

impl<'a> ActionExecutor<'a> {
    /// Create an executor retrying filesystem steps according to `retry`.
    #[must_use]
    pub const fn new(
        cluster: &'a dyn ClusterApi,
        fs: &'a dyn FsService,
        acl: &'a dyn AclService,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cluster,
            fs,
            acl,
            retry,
        }
    }

    /// Execute every item of `batch`.
    pub async fn execute(&self, session: &mut Session, batch: &ActionBatch) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for volume in &batch.purge {
            if self.purge(session, volume).await {
                report.purged += 1;
            } else {
                report.failed += 1;
            }
        }

        for volume in &batch.create {
            match self.create(session, volume).await {
                CreateOutcome::Complete => report.created += 1,
                CreateOutcome::Incomplete => {
                    report.created += 1;
                    report.failed += 1;
                }
                CreateOutcome::NotCreated => report.failed += 1,
            }
        }

        for volume in &batch.ace_mod {
            if self.apply_policy(session, volume).await {
                report.policies_updated += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            purged = report.purged,
            created = report.created,
            policies_updated = report.policies_updated,
            failed = report.failed,
            "Executed action batch"
        );
        report
    }

    async fn purge(&self, session: &mut Session, volume: &VolumeInstance) -> bool {
        let result = self
            .cluster
            .remove_volume(session.endpoint(), &volume.name)
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                let failure = ControlError::PartialActionFailure {
                    action: "removal",
                    volume: volume.name.clone(),
                    reason: e.to_string(),
                };
                alarm::report_failure(self.cluster, session, &e, &failure.to_string()).await;
                false
            }
        }
    }

    async fn create(&self, session: &mut Session, volume: &VolumeInstance) -> CreateOutcome {
        let fs = self.fs;

        if let Some(parent) = parent_dir(&volume.mount_path) {
            let ensured = retry_fixed(&self.retry, "ensure parent directory", || {
                fs.ensure_directory(parent)
            })
            .await;

            if let Err(e) = ensured {
                let reason = format!("parent directory {parent}: {e}");
                self.item_failed(session, "creation", volume, &reason).await;
                return CreateOutcome::NotCreated;
            }
        }

        let created = self
            .cluster
            .create_volume(session.endpoint(), volume)
            .await;
        if let Err(e) = created {
            let failure = ControlError::PartialActionFailure {
                action: "creation",
                volume: volume.name.clone(),
                reason: e.to_string(),
            };
            alarm::report_failure(self.cluster, session, &e, &failure.to_string()).await;
            return CreateOutcome::NotCreated;
        }

        let Some(props) = volume.properties.as_ref() else {
            return CreateOutcome::Complete;
        };
        let path = volume.mount_path.as_str();

        let owned = retry_fixed(&self.retry, "set volume owner", || {
            fs.set_owner(path, &props.owner, &props.group)
        })
        .await;
        if let Err(e) = owned {
            self.item_failed(session, "ownership change", volume, &e.to_string())
                .await;
            return CreateOutcome::Incomplete;
        }

        let permitted = retry_fixed(&self.retry, "set volume permission", || {
            fs.set_permission(path, props.permission)
        })
        .await;
        if let Err(e) = permitted {
            self.item_failed(session, "permission change", volume, &e.to_string())
                .await;
            return CreateOutcome::Incomplete;
        }

        if props.access_policy.is_none() {
            return CreateOutcome::Complete;
        }
        if !self.apply_policy(session, volume).await {
            return CreateOutcome::Incomplete;
        }

        if let Err(e) = self.acl.set_path_public_grants(path).await {
            self.item_failed(session, "public grant", volume, &e.to_string())
                .await;
            return CreateOutcome::Incomplete;
        }
        info!(volume = %volume.name, path = %path, "Applied public grants");

        CreateOutcome::Complete
    }

    /// Apply a volume's access expressions. Volumes without expressions
    /// count as done.
    async fn apply_policy(&self, session: &mut Session, volume: &VolumeInstance) -> bool {
        let Some(policy) = volume.access_policy() else {
            return true;
        };

        let result = self
            .cluster
            .set_volume_access_policy(session.endpoint(), &volume.name, policy)
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                let failure = ControlError::PartialActionFailure {
                    action: "access policy update",
                    volume: volume.name.clone(),
                    reason: e.to_string(),
                };
                alarm::report_failure(self.cluster, session, &e, &failure.to_string()).await;
                false
            }
        }
    }

    /// Alarm a filesystem step that used up its retries.
    async fn item_failed(
        &self,
        session: &Session,
        action: &'static str,
        volume: &VolumeInstance,
        reason: &str,
    ) {
        let failure = ControlError::PartialActionFailure {
            action,
            volume: volume.name.clone(),
            reason: reason.to_string(),
        };
        error!(error = %failure, "Volume action failed");
        alarm::raise(self.cluster, session, &failure.to_string()).await;
    }
}

/// The directory a mount path lives in, if it has one worth creating.
fn parent_dir(mount_path: &str) -> Option<&str> {
    Path::new(mount_path)
        .parent()
        .and_then(Path::to_str)
        .filter(|parent| !parent.is_empty() && *parent != "/")
}
