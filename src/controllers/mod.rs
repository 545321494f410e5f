//! Orchestration of the reconciliation phases
//!
//! The controller runs the connectivity phase and, when requested, the ACL
//! phase against the clients held in a shared [`Context`].

mod access_controller;

pub use access_controller::{run, RunReport};

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use tracing::info;

use crate::adapters::{
    BrokerAuthClient, ClusterControlClient, KafkaBrokerClient, MskControlClient,
    MskIamTokenProvider,
};
use crate::config::OperatorConfig;
use crate::error::{Error, Result};
use crate::model::ClusterIdentity;

/// Shared context for both phases
pub struct Context {
    /// MSK management API
    pub control: Arc<dyn ClusterControlClient>,
    /// Kafka brokers
    pub brokers: Arc<dyn BrokerAuthClient>,
    /// Resolved settings
    pub config: OperatorConfig,
}

impl Context {
    /// Create a context from existing clients
    pub fn new(
        control: Arc<dyn ClusterControlClient>,
        brokers: Arc<dyn BrokerAuthClient>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            control,
            brokers,
            config,
        }
    }

    /// Create AWS-backed clients using the default credential chain
    pub async fn from_aws(config: OperatorConfig, cluster: &ClusterIdentity) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.resolve_region(cluster) {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config.region().cloned().ok_or_else(|| {
            Error::config(format!(
                "No AWS region configured and none found in cluster identity {}",
                cluster
            ))
        })?;
        info!(region = %region, "Loaded AWS configuration");

        let control = Arc::new(MskControlClient::from_sdk_config(&sdk_config));
        let tokens = Arc::new(MskIamTokenProvider::new(region));
        let brokers = Arc::new(KafkaBrokerClient::new(
            tokens,
            config.client_id.clone(),
            config.client_timeout(),
        ));

        Ok(Self::new(control, brokers, config))
    }
}
