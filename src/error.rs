//! Error types for the MSK access operator

use std::fmt;

use thiserror::Error;

use crate::model::{GrantFailure, TargetConnectivity};

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of the cluster a transport failure came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    /// MSK management API
    Control,
    /// Kafka brokers
    Data,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Control => f.write_str("control plane"),
            Plane::Data => f.write_str("data plane"),
        }
    }
}

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Connectivity or authentication failure talking to either plane
    #[error("{plane} error: {message}")]
    Transport { plane: Plane, message: String },

    /// Stale optimistic-concurrency token
    #[error("Cluster version conflict: {0}")]
    VersionConflict(String),

    /// Polling budget exhausted before the cluster converged
    #[error("Cluster did not become {desired} after {attempts} polls")]
    Timeout {
        attempts: u32,
        desired: TargetConnectivity,
    },

    /// Waiting was aborted from outside
    #[error("Reconciliation cancelled after {polls} polls")]
    Cancelled { polls: u32 },

    /// The data plane rejected one or more ACL entries
    #[error(
        "{} of {submitted} ACL entries were rejected: {}",
        .failures.len(),
        join_failures(.failures)
    )]
    PartialGrant {
        submitted: usize,
        failures: Vec<GrantFailure>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_failures(failures: &[GrantFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a control plane transport error
    pub fn control_plane(msg: impl Into<String>) -> Self {
        Error::Transport {
            plane: Plane::Control,
            message: msg.into(),
        }
    }

    /// Create a data plane transport error
    pub fn data_plane(msg: impl Into<String>) -> Self {
        Error::Transport {
            plane: Plane::Data,
            message: msg.into(),
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport { .. } => "transport",
            Error::VersionConflict(_) => "version_conflict",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled { .. } => "cancelled",
            Error::PartialGrant { .. } => "partial_grant",
            Error::Config(_) | Error::Yaml(_) => "config",
            Error::Validation(_) => "validation",
            Error::Io(_) => "io",
        }
    }

    /// Whether the cluster may differ from how it was before the failed call.
    ///
    /// Timeouts and cancellations happen after an update was accepted, and a
    /// partial grant leaves the accepted entries in place. Every other kind
    /// fails before anything was changed.
    pub fn may_have_changed_state(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Cancelled { .. } | Error::PartialGrant { .. }
        )
    }
}
