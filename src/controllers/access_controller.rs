//! Access controller
//!
//! Runs connectivity reconciliation and then, if asked, the ACL bootstrap.
//! ACLs are only granted once the cluster's exposure has converged. Either
//! phase is abandoned as soon as the run is cancelled; dropping an open
//! broker session closes its connection.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::AccessRequest;
use crate::controllers::Context;
use crate::error::{Error, Result};
use crate::metrics;
use crate::model::{ClusterIdentity, TargetConnectivity};
use crate::reconcilers::{
    AclBootstrapper, BootstrapReport, ConnectivityReconciler, ReconcileOutcome,
};

const CONNECTIVITY_PHASE: &str = "connectivity";
const ACL_PHASE: &str = "acl";

/// Summary of a successful run
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub cluster: ClusterIdentity,
    pub desired: TargetConnectivity,
    pub connectivity: ReconcileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acls: Option<BootstrapReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Run both phases for one cluster
#[instrument(skip_all, fields(cluster = %request.cluster))]
pub async fn run(
    ctx: &Context,
    request: &AccessRequest,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let started_at = Utc::now();

    let connectivity = until_cancelled(
        CONNECTIVITY_PHASE,
        cancel,
        0,
        reconcile_connectivity(ctx, request, cancel),
    )
    .await?;

    let acls = if request.bootstrap_acls {
        let acls = until_cancelled(
            ACL_PHASE,
            cancel,
            connectivity.polls(),
            bootstrap_acls(ctx, request),
        )
        .await?;
        Some(acls)
    } else {
        None
    };

    let report = RunReport {
        cluster: request.cluster.clone(),
        desired: request.desired,
        connectivity,
        acls,
        started_at,
        finished_at: Utc::now(),
    };
    info!(
        report = %serde_json::to_string(&report).unwrap_or_default(),
        "Cluster access reconciled"
    );
    Ok(report)
}

/// Drive `work` to completion unless the run is cancelled first.
///
/// The phase is polled before the token so a cancellation it observes itself
/// (the connectivity polling loop) keeps its own poll count.
async fn until_cancelled<T>(
    phase: &str,
    cancel: &CancellationToken,
    polls: u32,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        result = work => result,
        _ = cancel.cancelled() => {
            let e = Error::Cancelled { polls };
            record_failure(phase, &e);
            Err(e)
        }
    }
}

async fn reconcile_connectivity(
    ctx: &Context,
    request: &AccessRequest,
    cancel: &CancellationToken,
) -> Result<ReconcileOutcome> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[CONNECTIVITY_PHASE])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&[CONNECTIVITY_PHASE])
        .inc();

    let reconciler = ConnectivityReconciler::new(ctx.control.clone());
    reconciler
        .reconcile(
            &request.cluster,
            request.desired,
            &ctx.config.reconcile_options(),
            cancel,
        )
        .await
        .inspect_err(|e| record_failure(CONNECTIVITY_PHASE, e))
}

async fn bootstrap_acls(ctx: &Context, request: &AccessRequest) -> Result<BootstrapReport> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[ACL_PHASE])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[ACL_PHASE]).inc();

    let bootstrapper = AclBootstrapper::new(ctx.control.clone(), ctx.brokers.clone());
    bootstrapper
        .bootstrap(&request.cluster, &ctx.config.principal)
        .await
        .inspect_err(|e| record_failure(ACL_PHASE, e))
}

fn record_failure(phase: &str, e: &Error) {
    error!(
        phase = phase,
        error = %e,
        state_may_have_changed = e.may_have_changed_state(),
        "Phase failed"
    );
    metrics::RECONCILIATION_ERRORS
        .with_label_values(&[phase, e.kind()])
        .inc();
}
