//! Alarm raising and per-item failure reporting.

use tracing::{error, warn};
use volkeep_cluster::{ClusterApi, ClusterError, ALARM_KEY};

use crate::session::Session;

/// Raise the volume manager alarm on the selected endpoint.
///
/// Delivery failures are logged and otherwise ignored; they never move the
/// endpoint.
pub async fn raise(cluster: &dyn ClusterApi, session: &Session, description: &str) {
    let endpoint = session.endpoint();
    if let Err(e) = cluster.raise_alarm(endpoint, ALARM_KEY, description).await {
        error!(
            endpoint = %endpoint,
            description = %description,
            error = %e,
            "Failed to raise alarm"
        );
    }
}

/// Report a failed cluster call made for a single item.
///
/// Transport failures fail over first and raise the threshold alarm when
/// they complete a run of consecutive failures. The item alarm is raised in
/// every case.
pub async fn report_failure(
    cluster: &dyn ClusterApi,
    session: &mut Session,
    err: &ClusterError,
    description: &str,
) {
    error!(error = %err, "{description}");

    if err.requires_failover() {
        let outcome = session.record_transport_failure();
        if outcome.threshold_reached {
            warn!(failures = outcome.failures, "Cluster endpoint failure threshold reached");
            raise(
                cluster,
                session,
                &format!("{} consecutive cluster call failures", outcome.failures),
            )
            .await;
        }
    }

    raise(cluster, session, description).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use volkeep_cluster::{ClusterCall, MockCluster};

    fn session() -> Session {
        Session::new(vec!["a".into(), "b".into()], 2)
    }

    #[tokio::test]
    async fn api_failure_alarms_without_failover() {
        let cluster = MockCluster::new();
        let mut session = session();
        let err = ClusterError::Api {
            call: "volume create".into(),
            message: "exists".into(),
        };

        report_failure(&cluster, &mut session, &err, "create of x failed").await;

        assert_eq!(session.endpoint(), "a");
        assert_eq!(session.consecutive_failures(), 0);
        assert_eq!(cluster.alarms(), vec!["create of x failed".to_string()]);
    }

    #[tokio::test]
    async fn transport_failure_fails_over_then_alarms() {
        let cluster = MockCluster::new();
        let mut session = session();
        let err = ClusterError::Transport("refused".into());

        report_failure(&cluster, &mut session, &err, "first").await;
        assert_eq!(session.endpoint(), "b");
        assert_eq!(
            cluster.calls(),
            vec![ClusterCall::Alarm {
                endpoint: "b".into(),
                description: "first".into(),
            }]
        );

        report_failure(&cluster, &mut session, &err, "second").await;
        assert_eq!(
            cluster.alarms(),
            vec![
                "first".to_string(),
                "2 consecutive cluster call failures".to_string(),
                "second".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn undeliverable_alarm_is_swallowed() {
        let cluster = MockCluster::new();
        cluster.set_endpoint_down("a", true);
        let session = session();

        raise(&cluster, &session, "anything").await;
        assert_eq!(session.endpoint(), "a");
        assert_eq!(cluster.calls().len(), 1);
    }
}
