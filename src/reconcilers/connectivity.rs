//! Public access reconciliation
//!
//! MSK applies connectivity updates asynchronously: an accepted
//! `UpdateConnectivity` only schedules the change. Convergence is therefore
//! confirmed by polling the bootstrap brokers until the public endpoint
//! list appears (or disappears).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::ClusterControlClient;
use crate::error::{Error, Result};
use crate::metrics;
use crate::model::{ClusterIdentity, ConnectivityState, ControlVersion, TargetConnectivity};

/// Derives a cluster's exposure from its bootstrap broker lists
#[derive(Clone)]
pub struct ConnectivityInspector {
    control: Arc<dyn ClusterControlClient>,
}

impl ConnectivityInspector {
    pub fn new(control: Arc<dyn ClusterControlClient>) -> Self {
        Self { control }
    }

    /// Fetch the endpoints and derive the current state. Errors are returned unchanged.
    pub async fn inspect(&self, cluster: &ClusterIdentity) -> Result<ConnectivityState> {
        let endpoints = self.control.get_endpoints(cluster).await?;
        Ok(endpoints.connectivity())
    }
}

/// Polling settings
#[derive(Clone, Copy, Debug)]
pub struct ReconcileOptions {
    /// Wait before each inspection
    pub poll_interval: Duration,
    /// Inspections before giving up
    pub max_attempts: u32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_attempts: 60,
        }
    }
}

/// Successful reconcile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum ReconcileOutcome {
    /// Cluster was already in the desired state; nothing was changed
    AlreadyConverged,
    /// Update accepted and observed
    Converged {
        /// UpdateConnectivity calls issued (2 after a version conflict)
        mutations: u32,
        /// Inspections until the new state was visible
        polls: u32,
    },
}

impl ReconcileOutcome {
    /// Inspections made after the update was accepted
    pub fn polls(&self) -> u32 {
        match self {
            ReconcileOutcome::AlreadyConverged => 0,
            ReconcileOutcome::Converged { polls, .. } => *polls,
        }
    }
}

/// Drives public access to the desired state
pub struct ConnectivityReconciler {
    control: Arc<dyn ClusterControlClient>,
    inspector: ConnectivityInspector,
}

impl ConnectivityReconciler {
    pub fn new(control: Arc<dyn ClusterControlClient>) -> Self {
        let inspector = ConnectivityInspector::new(control.clone());
        Self { control, inspector }
    }

    #[instrument(skip_all, fields(cluster = %cluster, desired = %desired))]
    pub async fn reconcile(
        &self,
        cluster: &ClusterIdentity,
        desired: TargetConnectivity,
        options: &ReconcileOptions,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let current = self.inspector.inspect(cluster).await?;
        if desired.is_satisfied_by(current) {
            info!(state = %current, "Cluster connectivity already up to date");
            return Ok(ReconcileOutcome::AlreadyConverged);
        }
        if current == ConnectivityState::Unknown {
            // Nothing to observe convergence against, so polling could only time out
            return Err(Error::validation(format!(
                "Cluster {} lists no IAM bootstrap brokers to observe",
                cluster
            )));
        }

        info!(current = %current, "Updating cluster connectivity");
        let mutations = self.submit_update(cluster, desired).await?;
        let polls = self.wait_for(cluster, desired, options, cancel).await?;

        info!(polls = polls, "Cluster connectivity converged");
        Ok(ReconcileOutcome::Converged { mutations, polls })
    }

    /// Issue the update, re-reading the version once on conflict.
    /// Returns the number of update calls made.
    async fn submit_update(
        &self,
        cluster: &ClusterIdentity,
        desired: TargetConnectivity,
    ) -> Result<u32> {
        let version = self.current_version(cluster).await?;
        match self
            .control
            .update_connectivity(cluster, &version, desired)
            .await
        {
            Ok(()) => Ok(1),
            Err(Error::VersionConflict(reason)) => {
                metrics::VERSION_CONFLICTS.inc();
                warn!(
                    version = %version,
                    reason = %reason,
                    "Stale cluster version, retrying once"
                );

                let version = self.current_version(cluster).await?;
                match self
                    .control
                    .update_connectivity(cluster, &version, desired)
                    .await
                {
                    Ok(()) => Ok(2),
                    Err(e) => {
                        if matches!(e, Error::VersionConflict(_)) {
                            metrics::VERSION_CONFLICTS.inc();
                        }
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn current_version(&self, cluster: &ClusterIdentity) -> Result<ControlVersion> {
        let description = self.control.describe(cluster).await?;
        info!(
            version = %description.current_version,
            state = description.state.as_deref().unwrap_or("unknown"),
            "Fetched cluster version"
        );
        Ok(description.current_version)
    }

    /// Poll until the desired state is visible. Returns the number of polls.
    async fn wait_for(
        &self,
        cluster: &ClusterIdentity,
        desired: TargetConnectivity,
        options: &ReconcileOptions,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        for attempt in 1..=options.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(polls = attempt - 1, "Waiting for convergence cancelled");
                    return Err(Error::Cancelled { polls: attempt - 1 });
                }
                _ = tokio::time::sleep(options.poll_interval) => {}
            }

            metrics::CONNECTIVITY_POLLS.inc();
            let state = self.inspector.inspect(cluster).await?;
            if desired.is_satisfied_by(state) {
                return Ok(attempt);
            }
            info!(
                attempt = attempt,
                max_attempts = options.max_attempts,
                state = %state,
                "Cluster state is transitioning"
            );
        }

        Err(Error::Timeout {
            attempts: options.max_attempts,
            desired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockClusterControlClient;
    use crate::model::{ClusterDescription, EndpointSet};

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("arn:aws:kafka:eu-west-1:123456789012:cluster/demo/abc-1")
    }

    fn private_endpoints() -> EndpointSet {
        EndpointSet::from_broker_strings(Some("b-1:9098"), None)
    }

    fn public_endpoints() -> EndpointSet {
        EndpointSet::from_broker_strings(Some("b-1:9098"), Some("b-1-public:9198"))
    }

    fn description(version: &str) -> ClusterDescription {
        ClusterDescription {
            current_version: ControlVersion::new(version),
            state: Some("ACTIVE".to_string()),
        }
    }

    #[tokio::test]
    async fn test_inspect_surfaces_transport_errors() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .times(1)
            .returning(|_| Err(Error::control_plane("throttled")));

        let inspector = ConnectivityInspector::new(Arc::new(mock));
        let err = inspector.inspect(&cluster()).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_already_converged_issues_no_mutation() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .times(1)
            .returning(|_| Ok(private_endpoints()));
        mock.expect_describe().never();
        mock.expect_update_connectivity().never();

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let outcome = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Private,
                &ReconcileOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyConverged);
    }

    #[tokio::test]
    async fn test_describe_failure_is_fatal() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .returning(|_| Ok(private_endpoints()));
        mock.expect_describe()
            .times(1)
            .returning(|_| Err(Error::control_plane("access denied")));
        mock.expect_update_connectivity().never();

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let err = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Public,
                &ReconcileOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_non_conflict_update_failure_is_not_retried() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .times(1)
            .returning(|_| Ok(private_endpoints()));
        mock.expect_describe()
            .times(1)
            .returning(|_| Ok(description("v1")));
        mock.expect_update_connectivity()
            .times(1)
            .returning(|_, _, _| Err(Error::control_plane("cluster is not ACTIVE")));

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let err = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Public,
                &ReconcileOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(!err.may_have_changed_state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_uses_fresh_version_after_conflict() {
        let mut mock = MockClusterControlClient::new();
        let mut reads = 0;
        mock.expect_get_endpoints().returning(move |_| {
            reads += 1;
            Ok(if reads == 1 {
                private_endpoints()
            } else {
                public_endpoints()
            })
        });
        let mut describes = 0;
        mock.expect_describe().times(2).returning(move |_| {
            describes += 1;
            Ok(description(&format!("v{}", describes)))
        });
        mock.expect_update_connectivity()
            .withf(|_, version, _| version.as_str() == "v1")
            .times(1)
            .returning(|_, _, _| Err(Error::VersionConflict("stale".to_string())));
        mock.expect_update_connectivity()
            .withf(|_, version, desired| {
                version.as_str() == "v2" && *desired == TargetConnectivity::Public
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let outcome = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Public,
                &ReconcileOptions {
                    poll_interval: Duration::from_secs(30),
                    max_attempts: 3,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Converged {
                mutations: 2,
                polls: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_transport_error_is_fatal() {
        let mut mock = MockClusterControlClient::new();
        let mut reads = 0;
        mock.expect_get_endpoints().times(2).returning(move |_| {
            reads += 1;
            if reads == 1 {
                Ok(public_endpoints())
            } else {
                Err(Error::control_plane("connection reset"))
            }
        });
        mock.expect_describe().returning(|_| Ok(description("v1")));
        mock.expect_update_connectivity()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let err = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Private,
                &ReconcileOptions {
                    poll_interval: Duration::from_secs(10),
                    max_attempts: 5,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_stops_before_first_poll() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .times(1)
            .returning(|_| Ok(private_endpoints()));
        mock.expect_describe().returning(|_| Ok(description("v1")));
        mock.expect_update_connectivity().returning(|_, _, _| Ok(()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let err = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Public,
                &ReconcileOptions::default(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { polls: 0 }));
    }

    #[tokio::test]
    async fn test_cluster_without_iam_brokers_fails_before_mutating() {
        let mut mock = MockClusterControlClient::new();
        mock.expect_get_endpoints()
            .times(1)
            .returning(|_| Ok(EndpointSet::default()));
        mock.expect_describe().never();
        mock.expect_update_connectivity().never();

        let reconciler = ConnectivityReconciler::new(Arc::new(mock));
        let err = reconciler
            .reconcile(
                &cluster(),
                TargetConnectivity::Private,
                &ReconcileOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(!err.may_have_changed_state());
    }

    #[test]
    fn test_outcome_polls() {
        assert_eq!(ReconcileOutcome::AlreadyConverged.polls(), 0);
        let converged = ReconcileOutcome::Converged {
            mutations: 2,
            polls: 4,
        };
        assert_eq!(converged.polls(), 4);
    }
}
