//! Adapters for the MSK control plane and the Kafka data plane
//!
//! The reconcilers only see the traits defined here. Production code plugs in
//! the AWS SDK and Kafka protocol implementations; tests plug in fakes.

mod broker;
mod iam_token;
mod msk;
mod tls;

pub use broker::*;
pub use iam_token::*;
pub use msk::*;
pub use tls::*;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::model::{
    AclRule, ClusterDescription, ClusterIdentity, ControlVersion, EndpointSet, GrantOutcome,
    TargetConnectivity,
};

/// Control plane operations used by the reconcilers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterControlClient: Send + Sync {
    /// Read cluster metadata, including the current version token
    async fn describe(&self, cluster: &ClusterIdentity) -> Result<ClusterDescription>;

    /// Read the bootstrap broker lists
    async fn get_endpoints(&self, cluster: &ClusterIdentity) -> Result<EndpointSet>;

    /// Schedule a connectivity change.
    ///
    /// Returns `Error::VersionConflict` when `version` is stale. Success only
    /// means MSK accepted the change, not that it has been applied.
    async fn update_connectivity(
        &self,
        cluster: &ClusterIdentity,
        version: &ControlVersion,
        desired: TargetConnectivity,
    ) -> Result<()>;
}

/// Opens authenticated connections to the brokers
#[async_trait]
pub trait BrokerAuthClient: Send + Sync {
    /// Connect to the first reachable target and authenticate
    async fn connect(&self, targets: &[String]) -> Result<Box<dyn BrokerSession>>;
}

/// One authenticated broker connection
#[async_trait]
pub trait BrokerSession: Send {
    /// Submit `rules` as one batch and return one outcome per rule, in order.
    ///
    /// A result list shorter than `rules` means the broker did not report on
    /// the remaining entries.
    async fn create_acls(&mut self, rules: &[AclRule]) -> Result<Vec<GrantOutcome>>;

    /// Close the connection
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Source of short-lived SASL bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String>;
}
