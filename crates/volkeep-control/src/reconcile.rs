//! Desired versus actual state comparison.
//!
//! [`ReconciliationEngine::prepare`] turns the group definitions and the
//! cluster inventory into an [`ActionBatch`]. Classification of observed
//! volumes is pure ([`classify`]); only the access policy read-back talks
//! to the cluster.
//!
//! ```text
//!  observed volume
//!        │ strip trailing _<digits>
//!        ▼
//!  known group? ──no──▶ Untracked
//!        │yes
//!        ▼
//!  in target set? ──yes──▶ Desired ──▶ ACE check after reload
//!        │no
//!        ▼
//!  retention == 0? ──yes──▶ Retained ──▶ ACE check after reload
//!        │no
//!        ▼
//!  today > suffix? ──yes──▶ Purge
//!        │no
//!        ▼
//!      Ahead (left alone)
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use volkeep_cluster::ClusterApi;
use volkeep_config::GroupSpec;
use volkeep_core::{ObservedName, VolumeInstance};

use crate::alarm;
use crate::error::ControlError;
use crate::schedule::{self, TargetSet};
use crate::session::Session;
use crate::types::ActionBatch;

/// How an observed volume relates to the configured groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition<'a> {
    /// No configured group owns the volume.
    Untracked,
    /// The volume is part of the current target set.
    Desired(&'a VolumeInstance),
    /// Outside the window of a group that keeps volumes forever.
    Retained(VolumeInstance),
    /// Older than the group's retention window.
    Purge,
    /// Newer than the window; left alone.
    Ahead,
    /// Owned by a group with retention but carrying no usable date suffix.
    Unparseable,
}

/// Classify one observed volume.
///
/// `groups` maps group names to their definitions.
#[must_use]
pub fn classify<'a>(
    observed: &VolumeInstance,
    groups: &HashMap<&str, &GroupSpec>,
    targets: &'a TargetSet,
    today: NaiveDate,
) -> Disposition<'a> {
    let parsed = ObservedName::parse(&observed.name);
    let Some(spec) = groups.get(parsed.group()) else {
        return Disposition::Untracked;
    };

    if let Some(target) = targets.get(&observed.name) {
        return Disposition::Desired(target);
    }

    if spec.keeps_forever() {
        return Disposition::Retained(retained_instance(spec, observed, &parsed));
    }

    match parsed.suffix_value() {
        Some(suffix) if schedule::day_number(today) > suffix => Disposition::Purge,
        Some(_) => Disposition::Ahead,
        None => Disposition::Unparseable,
    }
}

/// Rebuild a volume of a keep-forever group from its observed name.
///
/// The mount path follows the group pattern for the observed date, or the
/// observed mount directory when the suffix is not a date.
fn retained_instance(
    spec: &GroupSpec,
    observed: &VolumeInstance,
    parsed: &ObservedName,
) -> VolumeInstance {
    let mount_path = parsed
        .suffix()
        .and_then(schedule::suffix_date)
        .and_then(|date| schedule::mount_path(&spec.path_format, date))
        .unwrap_or_else(|| observed.mount_path.clone());

    VolumeInstance::planned(observed.name.clone(), mount_path, spec.properties.clone())
}

/// Computes action batches.
pub struct ReconciliationEngine<'a> {
    cluster: &'a dyn ClusterApi,
    throttle: Duration,
}

impl<'a> ReconciliationEngine<'a> {
    /// Create an engine reading access policies through `cluster`, pausing
    /// `throttle` before each read.
    #[must_use]
    pub const fn new(cluster: &'a dyn ClusterApi, throttle: Duration) -> Self {
        Self { cluster, throttle }
    }

    /// Compare the configured groups with the observed inventory.
    ///
    /// Access policies of existing volumes are only read back when
    /// `config_reloaded` is set. Read-back failures are alarmed and queue
    /// the volume for an update.
    pub async fn prepare(
        &self,
        session: &mut Session,
        specs: &[GroupSpec],
        inventory: &[VolumeInstance],
        config_reloaded: bool,
        today: NaiveDate,
    ) -> ActionBatch {
        let targets = schedule::target_set(specs, today);
        let groups: HashMap<&str, &GroupSpec> =
            specs.iter().map(|spec| (spec.name.as_str(), spec)).collect();

        let mut batch = ActionBatch::default();

        for observed in inventory {
            let candidate = match classify(observed, &groups, &targets, today) {
                Disposition::Untracked => {
                    debug!(volume = %observed.name, "Ignoring untracked volume");
                    continue;
                }
                Disposition::Desired(target) => target.clone(),
                Disposition::Retained(instance) => instance,
                Disposition::Purge => {
                    info!(volume = %observed.name, "Volume is past retention");
                    batch.purge.push(observed.clone());
                    continue;
                }
                Disposition::Ahead => {
                    debug!(volume = %observed.name, "Volume is ahead of the window");
                    continue;
                }
                Disposition::Unparseable => {
                    let warning = ControlError::ConsistencyWarning(format!(
                        "volume {} has no date suffix",
                        observed.name
                    ));
                    warn!(error = %warning, "Leaving volume alone");
                    continue;
                }
            };

            if config_reloaded && self.policy_drifted(session, &candidate).await {
                batch.ace_mod.push(candidate);
            }
        }

        let existing: HashSet<&str> = inventory.iter().map(|v| v.name.as_str()).collect();
        batch.create = targets
            .into_values()
            .filter(|target| !existing.contains(target.name.as_str()))
            .collect();

        debug!(
            create = batch.create.len(),
            purge = batch.purge.len(),
            ace_mod = batch.ace_mod.len(),
            "Prepared action batch"
        );
        batch
    }

    /// Returns true if the applied access expressions differ from the
    /// desired ones, are missing or cannot be read.
    async fn policy_drifted(&self, session: &mut Session, volume: &VolumeInstance) -> bool {
        let Some(desired) = volume.access_policy() else {
            return false;
        };

        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }

        let applied = self
            .cluster
            .get_volume_access_policy(session.endpoint(), &volume.name)
            .await;

        match applied {
            Ok(Some(applied)) if desired.matches(&applied) => false,
            Ok(Some(applied)) => {
                info!(
                    volume = %volume.name,
                    applied_read = %applied.read,
                    applied_write = %applied.write,
                    "Access policy drifted"
                );
                true
            }
            Ok(None) => {
                info!(volume = %volume.name, "No access policy applied, enforcing it");
                true
            }
            Err(e) => {
                alarm::report_failure(
                    self.cluster,
                    session,
                    &e,
                    &format!("access policy read-back of {} failed", volume.name),
                )
                .await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volkeep_cluster::{ClusterCall, MockCluster};
    use volkeep_core::{
        AccessPolicy, AccountingEntityType, CreationInterval, FsPermission, ReplicationType,
        VolumeProperties,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn spec(name: &str, retention: u32, ahead: u32, policy: Option<AccessPolicy>) -> GroupSpec {
        GroupSpec {
            name: name.into(),
            cluster: "my.cluster.com".into(),
            path_format: format!("/data/{name}/%Y%m%d"),
            properties: VolumeProperties {
                owner: "mapr".into(),
                group: "mapr".into(),
                permission: FsPermission::default(),
                ae: "mapr".into(),
                ae_type: AccountingEntityType::User,
                topology: "/data".into(),
                schedule: 0,
                replication: 3,
                min_replication: 2,
                replication_type: ReplicationType::HighThroughput,
                access_policy: policy,
            },
            interval: CreationInterval::Day,
            retention,
            ahead,
        }
    }

    fn observed(name: &str) -> VolumeInstance {
        VolumeInstance::observed(name, format!("/mnt/{name}"))
    }

    struct Fixture {
        spec: GroupSpec,
        targets: TargetSet,
    }

    impl Fixture {
        fn new(spec: GroupSpec) -> Self {
            let targets = schedule::target_set(std::slice::from_ref(&spec), today());
            Self { spec, targets }
        }

        fn classify(&self, name: &str) -> Disposition<'_> {
            let groups: HashMap<&str, &GroupSpec> = [(self.spec.name.as_str(), &self.spec)].into();
            classify(&observed(name), &groups, &self.targets, today())
        }
    }

    #[test]
    fn classification() {
        let logs = Fixture::new(spec("logs", 2, 1, None));

        assert_eq!(logs.classify("other_20240101"), Disposition::Untracked);
        assert!(matches!(
            logs.classify("logs_20240104"),
            Disposition::Desired(target) if target.name == "logs_20240104"
        ));
        assert_eq!(logs.classify("logs_20240102"), Disposition::Purge);
        assert_eq!(logs.classify("logs_20240110"), Disposition::Ahead);
        assert_eq!(logs.classify("logs"), Disposition::Unparseable);
    }

    #[test]
    fn purge_needs_strictly_older_suffix() {
        let mut monthly = spec("m", 1, 0, None);
        monthly.interval = CreationInterval::Month;
        let monthly = Fixture::new(monthly);

        assert_eq!(monthly.classify("m_20240105"), Disposition::Ahead);
        assert_eq!(monthly.classify("m_20240104"), Disposition::Purge);
        assert!(matches!(monthly.classify("m_20231201"), Disposition::Desired(_)));
    }

    #[test]
    fn keep_forever_volumes_are_retained() {
        let archive = Fixture::new(spec("archive", 0, 0, None));

        let Disposition::Retained(instance) = archive.classify("archive_20200101") else {
            panic!("expected retained");
        };
        assert_eq!(instance.name, "archive_20200101");
        assert_eq!(instance.mount_path, "/data/archive/20200101");
        assert!(instance.properties.is_some());

        let Disposition::Retained(instance) = archive.classify("archive_7") else {
            panic!("expected retained");
        };
        assert_eq!(instance.mount_path, "/mnt/archive_7");
    }

    #[tokio::test]
    async fn prepare_builds_disjoint_lists() {
        let cluster = MockCluster::new();
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into()], 3);
        let specs = [spec("logs", 1, 1, None)];
        let inventory = [observed("logs_20240105"), observed("logs_20231201"), observed("tmp")];

        let batch = engine
            .prepare(&mut session, &specs, &inventory, false, today())
            .await;

        let create: Vec<_> = batch.create.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(create, vec!["logs_20240104", "logs_20240106"]);
        assert_eq!(batch.purge, vec![observed("logs_20231201")]);
        assert!(batch.ace_mod.is_empty());
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn policy_checked_only_after_reload() {
        let cluster = MockCluster::new();
        cluster.add_volume("logs_20240105", "/data/logs/20240105");
        cluster.set_policy("logs_20240105", AccessPolicy::new("u:old", "u:old"));
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into()], 3);
        let specs = [spec("logs", 0, 0, Some(AccessPolicy::new("u:new", "u:new")))];
        let inventory = [observed("logs_20240105")];

        let batch = engine
            .prepare(&mut session, &specs, &inventory, false, today())
            .await;
        assert!(batch.is_empty());

        let batch = engine
            .prepare(&mut session, &specs, &inventory, true, today())
            .await;
        assert_eq!(batch.ace_mod.len(), 1);
        assert_eq!(batch.ace_mod[0].name, "logs_20240105");
        assert_eq!(
            batch.ace_mod[0].access_policy(),
            Some(&AccessPolicy::new("u:new", "u:new"))
        );
    }

    #[tokio::test]
    async fn policy_comparison_ignores_whitespace() {
        let cluster = MockCluster::new();
        cluster.add_volume("logs_20240105", "/data/logs/20240105");
        cluster.set_policy("logs_20240105", AccessPolicy::new("u:a&g:b", "u:a"));
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into()], 3);
        let specs = [spec("logs", 0, 0, Some(AccessPolicy::new("u:a & g:b", " u:a ")))];

        let batch = engine
            .prepare(&mut session, &specs, &[observed("logs_20240105")], true, today())
            .await;
        assert!(batch.ace_mod.is_empty());
    }

    #[tokio::test]
    async fn failed_read_back_queues_update_and_alarms() {
        let cluster = MockCluster::new();
        cluster.add_volume("logs_20240105", "/data/logs/20240105");
        cluster.reject("get_policy", "logs_20240105");
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into(), "b".into()], 3);
        let specs = [spec("logs", 0, 0, Some(AccessPolicy::new("p", "p")))];

        let batch = engine
            .prepare(&mut session, &specs, &[observed("logs_20240105")], true, today())
            .await;

        assert_eq!(batch.ace_mod.len(), 1);
        assert_eq!(session.endpoint(), "a");
        assert_eq!(cluster.alarms().len(), 1);
    }

    #[tokio::test]
    async fn volumes_without_policy_are_queued_quietly() {
        let cluster = MockCluster::new();
        for day in ["20240103", "20240104", "20240105"] {
            cluster.add_volume(&format!("logs_{day}"), &format!("/data/logs/{day}"));
        }
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into(), "b".into()], 3);
        let specs = [spec("logs", 2, 0, Some(AccessPolicy::new("p", "p")))];
        let inventory = [
            observed("logs_20240103"),
            observed("logs_20240104"),
            observed("logs_20240105"),
        ];

        let batch = engine
            .prepare(&mut session, &specs, &inventory, true, today())
            .await;

        let queued: Vec<_> = batch.ace_mod.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(queued, vec!["logs_20240103", "logs_20240104", "logs_20240105"]);
        assert_eq!(session.endpoint(), "a");
        assert_eq!(session.consecutive_failures(), 0);
        assert!(cluster.alarms().is_empty());
    }

    #[tokio::test]
    async fn unreachable_read_back_fails_over() {
        let cluster = MockCluster::new();
        cluster.add_volume("logs_20240105", "/data/logs/20240105");
        cluster.set_endpoint_down("a", true);
        let engine = ReconciliationEngine::new(&cluster, Duration::ZERO);
        let mut session = Session::new(vec!["a".into(), "b".into()], 3);
        let specs = [spec("logs", 0, 0, Some(AccessPolicy::new("p", "p")))];

        let batch = engine
            .prepare(&mut session, &specs, &[observed("logs_20240105")], true, today())
            .await;

        assert_eq!(batch.ace_mod.len(), 1);
        assert_eq!(session.endpoint(), "b");
        assert_eq!(session.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn read_back_is_throttled() {
        let cluster = MockCluster::new();
        cluster.add_volume("logs_20240104", "/x");
        cluster.add_volume("logs_20240105", "/y");
        cluster.set_policy("logs_20240104", AccessPolicy::new("p", "p"));
        cluster.set_policy("logs_20240105", AccessPolicy::new("p", "p"));
        let engine = ReconciliationEngine::new(&cluster, Duration::from_millis(250));
        let mut session = Session::new(vec!["a".into()], 3);
        let specs = [spec("logs", 1, 0, Some(AccessPolicy::new("p", "p")))];
        let started = tokio::time::Instant::now();

        engine
            .prepare(
                &mut session,
                &specs,
                &[observed("logs_20240104"), observed("logs_20240105")],
                true,
                today(),
            )
            .await;

        assert_eq!(started.elapsed(), Duration::from_millis(500));
        let reads = cluster
            .calls()
            .into_iter()
            .filter(|c| matches!(c, ClusterCall::GetPolicy { .. }))
            .count();
        assert_eq!(reads, 2);
    }
}
