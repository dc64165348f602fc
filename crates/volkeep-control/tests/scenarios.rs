//! End-to-end reconciliation scenarios against in-memory collaborators.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{Days, NaiveDate};
use volkeep_auth::MockAuthProvider;
use volkeep_cluster::{ClusterCall, MockCluster, MockFs};
use volkeep_config::{GroupSpec, LoadedConfig, ManagerConfig, MockConfigStore};
use volkeep_control::{
    ActionBatch, Collaborators, ControlLoop, ReconciliationEngine, Session, INVENTORY_ALARM,
};
use volkeep_core::{
    AccessPolicy, AccountingEntityType, CreationInterval, CredentialRef, FsPermission,
    ReplicationType, VolumeInstance, VolumeProperties,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
}

fn suffix(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn group(name: &str, interval: CreationInterval, retention: u32, ahead: u32) -> GroupSpec {
    GroupSpec {
        name: name.into(),
        cluster: "my.cluster.com".into(),
        path_format: format!("/data/{name}/%Y-%m-%d"),
        properties: VolumeProperties {
            owner: "mapr".into(),
            group: "mapr".into(),
            permission: FsPermission::from_octal("750").unwrap(),
            ae: "mapr".into(),
            ae_type: AccountingEntityType::User,
            topology: "/data/default-rack".into(),
            schedule: 0,
            replication: 3,
            min_replication: 2,
            replication_type: ReplicationType::HighThroughput,
            access_policy: None,
        },
        interval,
        retention,
        ahead,
    }
}

fn observed(name: &str) -> VolumeInstance {
    VolumeInstance::observed(name, format!("/mnt/{name}"))
}

fn names(volumes: &[VolumeInstance]) -> Vec<&str> {
    volumes.iter().map(|v| v.name.as_str()).collect()
}

async fn prepare(
    cluster: &MockCluster,
    specs: &[GroupSpec],
    inventory: &[VolumeInstance],
    reloaded: bool,
) -> ActionBatch {
    let engine = ReconciliationEngine::new(cluster, Duration::ZERO);
    let mut session = Session::new(vec!["https://a:8443".into()], 3);
    engine
        .prepare(&mut session, specs, inventory, reloaded, today())
        .await
}

fn loaded(nodes: &[&str], groups: Vec<GroupSpec>) -> LoadedConfig {
    LoadedConfig {
        manager: ManagerConfig {
            rest_nodes: nodes.iter().map(|n| (*n).to_string()).collect(),
            rest_port: 8443,
            credential: CredentialRef {
                principal: "mapr@EXAMPLE.COM".into(),
                keytab: PathBuf::from("/opt/mapr/conf/mapr.keytab"),
            },
            loop_interval: Duration::from_secs(60),
            groups_dir: PathBuf::from("/opt/volkeep/conf/vg.d"),
            fs_action_attempts: 3,
            rest_throttle: Duration::ZERO,
            failure_alarm_threshold: 3,
            alarm_entity: "node1".into(),
            tls_accept_invalid_certs: false,
            rest_user: None,
            rest_password: None,
            hadoop_bin: PathBuf::from("hadoop"),
            ticket_lifetime: Duration::from_secs(36_000),
        },
        groups,
    }
}

fn control_loop(
    config: LoadedConfig,
    cluster: Arc<MockCluster>,
) -> (ControlLoop, Arc<MockConfigStore>) {
    let store = Arc::new(MockConfigStore::new(config.clone()));
    let fs = Arc::new(MockFs::new());
    let services = Collaborators {
        store: store.clone(),
        cluster,
        fs: fs.clone(),
        acl: fs,
        auth: Arc::new(MockAuthProvider::new(chrono::Duration::hours(10))),
    };
    (ControlLoop::new(services, config, SystemTime::now()), store)
}

#[tokio::test]
async fn scenario_a_empty_inventory_creates_whole_window() {
    let cluster = MockCluster::new();
    let specs = [group("foo", CreationInterval::Day, 1, 2)];

    let batch = prepare(&cluster, &specs, &[], false).await;

    let expected: Vec<String> = [-1i64, 0, 1, 2]
        .iter()
        .map(|&offset| {
            let date = if offset < 0 {
                today() - Days::new(offset.unsigned_abs())
            } else {
                today() + Days::new(offset.unsigned_abs())
            };
            format!("foo_{}", suffix(date))
        })
        .collect();
    assert_eq!(names(&batch.create), expected);
    assert!(batch.purge.is_empty());
    assert!(batch.ace_mod.is_empty());
}

#[tokio::test]
async fn scenario_b_expired_volume_is_purged() {
    let cluster = MockCluster::new();
    let specs = [group("foo", CreationInterval::Day, 1, 2)];
    let old = format!("foo_{}", suffix(today() - Days::new(10)));

    let batch = prepare(&cluster, &specs, &[observed(&old)], false).await;

    assert_eq!(names(&batch.purge), vec![old.as_str()]);
    assert_eq!(batch.create.len(), 4);
}

#[tokio::test]
async fn scenario_c_failover_alarms_once() {
    let cluster = Arc::new(MockCluster::new());
    cluster.set_endpoint_down("https://a:8443", true);
    cluster.set_endpoint_down("https://b:8443", true);
    let (mut control, _store) = control_loop(loaded(&["a", "b"], Vec::new()), cluster.clone());

    let mut endpoints = vec![control.session().endpoint().to_string()];
    for _ in 0..3 {
        let report = control.run_cycle(today()).await;
        assert!(!report.is_reconciled());
        endpoints.push(control.session().endpoint().to_string());
    }

    assert_eq!(
        endpoints,
        vec!["https://a:8443", "https://b:8443", "https://a:8443", "https://b:8443"]
    );
    assert_eq!(cluster.alarms(), vec![INVENTORY_ALARM.to_string()]);

    // Further failures stay quiet until the counter is reset
    control.run_cycle(today()).await;
    assert_eq!(cluster.alarms().len(), 1);
}

#[tokio::test]
async fn window_size_matches_retention_and_ahead() {
    let cluster = MockCluster::new();
    for (retention, ahead) in [(0, 0), (3, 0), (0, 4), (7, 2), (31, 31)] {
        let specs = [group("d", CreationInterval::Day, retention, ahead)];
        let batch = prepare(&cluster, &specs, &[], false).await;
        assert_eq!(batch.create.len(), (retention + ahead + 1) as usize);
        assert!(batch.purge.is_empty());
        assert!(batch.ace_mod.is_empty());
    }
}

#[tokio::test]
async fn prepare_is_idempotent() {
    let cluster = MockCluster::new();
    cluster.add_volume("foo_20240105", "/data/foo/2024-01-05");
    cluster.set_policy("foo_20240105", AccessPolicy::new("u:old", "u:old"));
    let mut spec = group("foo", CreationInterval::Day, 2, 1);
    spec.properties.access_policy = Some(AccessPolicy::new("u:new", "u:new"));
    let specs = [spec, group("bar", CreationInterval::Month, 1, 1)];
    let inventory = [
        observed("foo_20240105"),
        observed("foo_20231225"),
        observed("bar_20231101"),
        observed("stray_20240101"),
    ];

    let first = prepare(&cluster, &specs, &inventory, true).await;
    let second = prepare(&cluster, &specs, &inventory, true).await;

    assert_eq!(first, second);
    assert_eq!(names(&first.purge), vec!["foo_20231225", "bar_20231101"]);
    assert_eq!(names(&first.ace_mod), vec!["foo_20240105"]);
}

#[tokio::test]
async fn keep_forever_groups_are_never_purged() {
    let cluster = MockCluster::new();
    let specs = [group("archive", CreationInterval::Day, 0, 1)];
    let inventory = [
        observed("archive_19990101"),
        observed("archive_20231231"),
        observed("archive_1"),
        observed("archive"),
    ];

    let batch = prepare(&cluster, &specs, &inventory, true).await;

    assert!(batch.purge.is_empty());
    assert!(batch.ace_mod.is_empty());
    assert_eq!(names(&batch.create), vec!["archive_20240105", "archive_20240106"]);
}

#[tokio::test]
async fn keep_forever_volumes_still_get_policy_updates() {
    let cluster = MockCluster::new();
    cluster.add_volume("archive_19990101", "/data/archive/1999-01-01");
    cluster.add_volume("archive_20231231", "/data/archive/2023-12-31");
    cluster.add_volume("archive_20240105", "/data/archive/2024-01-05");
    cluster.set_policy("archive_19990101", AccessPolicy::new("u:old", "u:old"));
    cluster.set_policy("archive_20240105", AccessPolicy::new("u:new", "u:new"));
    let mut spec = group("archive", CreationInterval::Day, 0, 0);
    spec.properties.access_policy = Some(AccessPolicy::new("u:new", "u:new"));
    let inventory = [
        observed("archive_19990101"),
        observed("archive_20231231"),
        observed("archive_20240105"),
    ];

    let batch = prepare(&cluster, &[spec], &inventory, true).await;

    assert!(batch.purge.is_empty());
    assert!(batch.create.is_empty());
    assert_eq!(names(&batch.ace_mod), vec!["archive_19990101", "archive_20231231"]);
    assert_eq!(batch.ace_mod[0].mount_path, "/data/archive/1999-01-01");
    for volume in &batch.ace_mod {
        assert_eq!(
            volume.access_policy(),
            Some(&AccessPolicy::new("u:new", "u:new"))
        );
    }
    assert!(cluster.alarms().is_empty());
}

#[tokio::test]
async fn static_group_yields_one_volume_whatever_the_window() {
    let cluster = MockCluster::new();
    let mut spec = group("static", CreationInterval::None, 5, 9);
    spec.path_format = "/data/static".into();

    let batch = prepare(&cluster, &[spec.clone()], &[], false).await;
    assert_eq!(names(&batch.create), vec!["static"]);
    assert_eq!(batch.create[0].mount_path, "/data/static");

    let batch = prepare(&cluster, &[spec], &[observed("static")], false).await;
    assert!(batch.is_empty());
}

#[tokio::test]
async fn access_expressions_compare_without_whitespace() {
    let cluster = MockCluster::new();
    cluster.add_volume("foo_20240105", "/data/foo/2024-01-05");
    cluster.add_volume("bar_20240105", "/data/bar/2024-01-05");
    cluster.set_policy("foo_20240105", AccessPolicy::new("a&b", "a&b"));
    cluster.set_policy("bar_20240105", AccessPolicy::new("a|b", "a&b"));

    let mut foo = group("foo", CreationInterval::Day, 0, 0);
    foo.properties.access_policy = Some(AccessPolicy::new("a & b", "a & b"));
    let mut bar = group("bar", CreationInterval::Day, 0, 0);
    bar.properties.access_policy = Some(AccessPolicy::new("a & b", "a & b"));

    let batch = prepare(
        &cluster,
        &[foo, bar],
        &[observed("foo_20240105"), observed("bar_20240105")],
        true,
    )
    .await;

    assert_eq!(names(&batch.ace_mod), vec!["bar_20240105"]);
}

#[tokio::test]
async fn untracked_volumes_are_ignored() {
    let cluster = MockCluster::new();
    let specs = [group("foo", CreationInterval::Day, 1, 0)];
    let inventory = [
        observed("foobar_20200101"),
        observed("other"),
        observed("foo_x_20200101"),
        observed("mapr.cluster.root"),
    ];

    let batch = prepare(&cluster, &specs, &inventory, true).await;

    let mentioned: Vec<&str> = batch
        .purge
        .iter()
        .chain(&batch.ace_mod)
        .chain(&batch.create)
        .map(|v| v.name.as_str())
        .collect();
    for volume in &inventory {
        assert!(!mentioned.contains(&volume.name.as_str()));
    }
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn cycles_converge_and_roll_over() {
    let cluster = Arc::new(MockCluster::new());
    let mut spec = group("foo", CreationInterval::Day, 1, 1);
    spec.properties.access_policy = Some(AccessPolicy::new("p", "u:mapr"));
    let (mut control, store) = control_loop(loaded(&["a"], vec![spec.clone()]), cluster.clone());

    control.run_cycle(today()).await;
    assert_eq!(
        cluster.volume_names(),
        vec!["foo_20240104", "foo_20240105", "foo_20240106"]
    );
    assert!(cluster.alarms().is_empty());

    // Nothing left to do on the same day
    cluster.clear_calls();
    control.run_cycle(today()).await;
    assert_eq!(
        cluster.calls(),
        vec![ClusterCall::List {
            endpoint: "https://a:8443".into(),
        }]
    );

    // A day later the oldest volume expires and a new one is created
    control.run_cycle(today() + Days::new(1)).await;
    assert_eq!(
        cluster.volume_names(),
        vec!["foo_20240105", "foo_20240106", "foo_20240107"]
    );

    // Policy drift is repaired after the next reload
    cluster.set_policy("foo_20240106", AccessPolicy::new("u:intruder", "u:intruder"));
    control.run_cycle(today() + Days::new(1)).await;
    assert_eq!(
        cluster.policy("foo_20240106"),
        Some(AccessPolicy::new("u:intruder", "u:intruder"))
    );

    store.replace(loaded(&["a"], vec![spec]));
    control.run_cycle(today() + Days::new(1)).await;
    assert_eq!(
        cluster.policy("foo_20240106"),
        Some(AccessPolicy::new("p", "u:mapr"))
    );
}
