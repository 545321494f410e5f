//! Baseline ACL bootstrap
//!
//! Grants the fixed baseline table to an administrative principal. The
//! broker reports an outcome per entry, and every outcome is collected
//! before deciding whether the batch succeeded.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::adapters::{BrokerAuthClient, ClusterControlClient};
use crate::error::{Error, Result};
use crate::metrics;
use crate::model::{
    baseline_rules, AclRule, ClusterIdentity, GrantFailure, GrantOutcome, GrantRejection,
};

/// Successful bootstrap
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub principal: String,
    pub granted: usize,
    /// Broker addresses offered to the data plane client
    pub targets: Vec<String>,
}

/// Provisions the baseline ACLs for a principal
pub struct AclBootstrapper {
    control: Arc<dyn ClusterControlClient>,
    brokers: Arc<dyn BrokerAuthClient>,
}

impl AclBootstrapper {
    pub fn new(
        control: Arc<dyn ClusterControlClient>,
        brokers: Arc<dyn BrokerAuthClient>,
    ) -> Self {
        Self { control, brokers }
    }

    #[instrument(skip_all, fields(cluster = %cluster, principal = %principal))]
    pub async fn bootstrap(
        &self,
        cluster: &ClusterIdentity,
        principal: &str,
    ) -> Result<BootstrapReport> {
        let endpoints = self.control.get_endpoints(cluster).await?;
        let targets = endpoints.connection_targets();
        if targets.is_empty() {
            return Err(Error::data_plane(format!(
                "Cluster {} exposes no IAM bootstrap brokers",
                cluster
            )));
        }

        let rules = baseline_rules(principal);
        info!(
            principal = %principal,
            entries = rules.len(),
            brokers = targets.len(),
            "Granting baseline ACLs"
        );

        let mut session = self.brokers.connect(&targets).await?;
        let submitted = session.create_acls(&rules).await;
        // Close before looking at the outcome so failed submissions release the connection too
        let closed = session.close().await;

        let outcomes = submitted?;
        if let Err(e) = closed {
            warn!(error = %e, "Failed to close broker connection cleanly");
        }

        let failures = collect_failures(&rules, outcomes);
        let granted = rules.len() - failures.len();
        metrics::ACL_GRANTS
            .with_label_values(&["granted"])
            .inc_by(granted as f64);
        metrics::ACL_GRANTS
            .with_label_values(&["rejected"])
            .inc_by(failures.len() as f64);

        if !failures.is_empty() {
            for failure in &failures {
                warn!(
                    entry = failure.entry,
                    rule = %failure.rule,
                    reason = %failure.rejection,
                    "ACL entry rejected"
                );
            }
            return Err(Error::PartialGrant {
                submitted: rules.len(),
                failures,
            });
        }

        info!(principal = %principal, granted = granted, "Baseline ACLs granted");
        Ok(BootstrapReport {
            principal: principal.to_string(),
            granted,
            targets,
        })
    }
}

/// Pair each rule with its outcome; rules without an outcome count as failed
fn collect_failures(rules: &[AclRule], outcomes: Vec<GrantOutcome>) -> Vec<GrantFailure> {
    let mut outcomes = outcomes.into_iter();
    rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            let rejection = match outcomes.next() {
                Some(Ok(())) => return None,
                Some(Err(rejection)) => rejection,
                None => GrantRejection {
                    error_code: -1,
                    message: "no result returned by broker".to_string(),
                },
            };
            Some(GrantFailure {
                entry: index + 1,
                rule: rule.clone(),
                rejection,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(code: i16) -> GrantRejection {
        GrantRejection {
            error_code: code,
            message: "rejected".to_string(),
        }
    }

    #[test]
    fn test_collect_failures_all_ok() {
        let rules = baseline_rules("User:admin");
        let outcomes = vec![Ok(()); rules.len()];
        assert!(collect_failures(&rules, outcomes).is_empty());
    }

    #[test]
    fn test_collect_failures_names_rejected_entries() {
        let rules = baseline_rules("User:admin");
        let outcomes = vec![
            Ok(()),
            Err(rejection(31)),
            Ok(()),
            Ok(()),
            Err(rejection(42)),
        ];

        let failures = collect_failures(&rules, outcomes);
        let entries: Vec<usize> = failures.iter().map(|f| f.entry).collect();
        assert_eq!(entries, vec![2, 5]);
        assert_eq!(failures[0].rule, rules[1]);
        assert_eq!(failures[1].rejection.error_code, 42);
    }

    #[test]
    fn test_collect_failures_missing_results_are_failures() {
        let rules = baseline_rules("User:admin");
        let failures = collect_failures(&rules, vec![Ok(()), Ok(()), Ok(())]);

        let entries: Vec<usize> = failures.iter().map(|f| f.entry).collect();
        assert_eq!(entries, vec![4, 5]);
        assert_eq!(failures[0].rejection.error_code, -1);
    }
}
