//! Cluster identity and connectivity types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique handle for one MSK cluster (its ARN)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterIdentity(String);

impl ClusterIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Region segment of the identity when it is an ARN
    ///
    /// `arn:aws:kafka:eu-west-1:123456789012:cluster/name/uuid` yields `eu-west-1`.
    pub fn region(&self) -> Option<&str> {
        let mut parts = self.0.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let _partition = parts.next()?;
        let _service = parts.next()?;
        parts.next().filter(|region| !region.is_empty())
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optimistic-concurrency token returned by `DescribeCluster`.
///
/// Stale as soon as any mutation succeeds, so it is fetched right before
/// each update and never reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlVersion(String);

impl ControlVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a `describe` call against the control plane
#[derive(Clone, Debug)]
pub struct ClusterDescription {
    pub current_version: ControlVersion,
    /// Lifecycle state as reported by MSK (ACTIVE, UPDATING, ...)
    pub state: Option<String>,
}

/// Observed network exposure of a cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectivityState {
    Private,
    Public,
    Unknown,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Private => f.write_str("private"),
            ConnectivityState::Public => f.write_str("public"),
            ConnectivityState::Unknown => f.write_str("unknown"),
        }
    }
}

/// Exposure a caller may ask for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetConnectivity {
    Private,
    Public,
}

impl TargetConnectivity {
    pub fn from_public(public: bool) -> Self {
        if public {
            TargetConnectivity::Public
        } else {
            TargetConnectivity::Private
        }
    }

    /// MSK `PublicAccess.Type` value for this target
    pub fn public_access_type(self) -> &'static str {
        match self {
            TargetConnectivity::Public => "SERVICE_PROVIDED_EIPS",
            TargetConnectivity::Private => "DISABLED",
        }
    }

    pub fn is_satisfied_by(self, state: ConnectivityState) -> bool {
        ConnectivityState::from(self) == state
    }
}

impl From<TargetConnectivity> for ConnectivityState {
    fn from(target: TargetConnectivity) -> Self {
        match target {
            TargetConnectivity::Private => ConnectivityState::Private,
            TargetConnectivity::Public => ConnectivityState::Public,
        }
    }
}

impl fmt::Display for TargetConnectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ConnectivityState::from(*self).fmt(f)
    }
}

/// Bootstrap broker lists of a cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointSet {
    /// Brokers reachable from inside the VPC
    pub private: Option<Vec<String>>,
    /// Brokers reachable from the internet, present only while public access is on
    pub public: Option<Vec<String>>,
}

impl EndpointSet {
    /// Build from MSK's comma separated broker strings
    pub fn from_broker_strings(private: Option<&str>, public: Option<&str>) -> Self {
        Self {
            private: private.map(split_brokers),
            public: public.map(split_brokers),
        }
    }

    /// Exposure derived from which lists are populated
    pub fn connectivity(&self) -> ConnectivityState {
        let populated = |list: &Option<Vec<String>>| list.as_ref().is_some_and(|l| !l.is_empty());

        if populated(&self.public) {
            ConnectivityState::Public
        } else if populated(&self.private) {
            ConnectivityState::Private
        } else {
            ConnectivityState::Unknown
        }
    }

    /// Ordered, de-duplicated union of public then private brokers
    pub fn connection_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for broker in self
            .public
            .iter()
            .chain(self.private.iter())
            .flatten()
        {
            if !targets.contains(broker) {
                targets.push(broker.clone());
            }
        }
        targets
    }
}

fn split_brokers(brokers: &str) -> Vec<String> {
    brokers
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}
