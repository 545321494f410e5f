//! MSK control plane client backed by the AWS SDK

use async_trait::async_trait;
use aws_sdk_kafka::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kafka::types::{ConnectivityInfo, PublicAccess};
use aws_sdk_kafka::Client;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    ClusterDescription, ClusterIdentity, ControlVersion, EndpointSet, TargetConnectivity,
};

use super::ClusterControlClient;

/// Control plane client for Amazon MSK
#[derive(Clone, Debug)]
pub struct MskControlClient {
    client: Client,
}

impl MskControlClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a loaded AWS SDK config
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl ClusterControlClient for MskControlClient {
    async fn describe(&self, cluster: &ClusterIdentity) -> Result<ClusterDescription> {
        let output = self
            .client
            .describe_cluster()
            .cluster_arn(cluster.as_str())
            .send()
            .await
            .map_err(|e| {
                Error::control_plane(format!("DescribeCluster failed: {}", DisplayErrorContext(&e)))
            })?;

        let info = output.cluster_info().ok_or_else(|| {
            Error::control_plane(format!(
                "DescribeCluster returned no cluster info for {}",
                cluster
            ))
        })?;
        let version = info.current_version().ok_or_else(|| {
            Error::control_plane(format!("Cluster {} has no current version", cluster))
        })?;

        Ok(ClusterDescription {
            current_version: ControlVersion::new(version),
            state: info.state().map(|s| s.as_str().to_string()),
        })
    }

    async fn get_endpoints(&self, cluster: &ClusterIdentity) -> Result<EndpointSet> {
        let output = self
            .client
            .get_bootstrap_brokers()
            .cluster_arn(cluster.as_str())
            .send()
            .await
            .map_err(|e| {
                Error::control_plane(format!(
                    "GetBootstrapBrokers failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let endpoints = EndpointSet::from_broker_strings(
            output.bootstrap_broker_string_sasl_iam(),
            output.bootstrap_broker_string_public_sasl_iam(),
        );
        debug!(
            cluster = %cluster,
            private = ?endpoints.private,
            public = ?endpoints.public,
            "Fetched bootstrap brokers"
        );
        Ok(endpoints)
    }

    async fn update_connectivity(
        &self,
        cluster: &ClusterIdentity,
        version: &ControlVersion,
        desired: TargetConnectivity,
    ) -> Result<()> {
        let connectivity = ConnectivityInfo::builder()
            .public_access(
                PublicAccess::builder()
                    .r#type(desired.public_access_type())
                    .build(),
            )
            .build();

        let output = self
            .client
            .update_connectivity()
            .cluster_arn(cluster.as_str())
            .current_version(version.as_str())
            .connectivity_info(connectivity)
            .send()
            .await
            .map_err(classify_update_error)?;

        info!(
            cluster = %cluster,
            operation = output.cluster_operation_arn().unwrap_or("unknown"),
            "Connectivity update accepted"
        );
        Ok(())
    }
}

/// Map an UpdateConnectivity failure to a version conflict or a transport error
fn classify_update_error<E, R>(err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    if is_version_conflict(err.code(), err.message()) {
        Error::VersionConflict(detail)
    } else {
        Error::control_plane(format!("UpdateConnectivity failed: {}", detail))
    }
}

/// MSK reports a stale `CurrentVersion` either as a conflict or as a bad
/// request naming the version.
fn is_version_conflict(code: Option<&str>, message: Option<&str>) -> bool {
    match code {
        Some("ConflictException") => true,
        Some("BadRequestException") => message
            .map(|m| m.to_lowercase().contains("version"))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_exception_is_version_conflict() {
        assert!(is_version_conflict(Some("ConflictException"), None));
    }

    #[test]
    fn test_bad_request_about_version_is_version_conflict() {
        assert!(is_version_conflict(
            Some("BadRequestException"),
            Some("The provided cluster version K3AEGXETSR30VB does not match the current version")
        ));
        assert!(!is_version_conflict(
            Some("BadRequestException"),
            Some("The cluster is not in ACTIVE state")
        ));
    }

    #[test]
    fn test_other_errors_are_not_conflicts() {
        assert!(!is_version_conflict(Some("ForbiddenException"), Some("version")));
        assert!(!is_version_conflict(None, None));
    }
}
