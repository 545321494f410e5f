//! Command line and file configuration
//!
//! Settings are read from an optional YAML file and then overridden by
//! whatever was given on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{ClusterIdentity, TargetConnectivity};
use crate::reconcilers::connectivity::ReconcileOptions;

/// Reconcile public access and baseline ACLs of an Amazon MSK cluster
#[derive(Parser, Debug)]
#[command(name = "msk-access-operator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// ARN of the MSK cluster
    #[arg(long, alias = "arn")]
    pub cluster: String,

    /// Make the cluster publicly reachable (false disables public access)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub public: bool,

    /// Grant the baseline ACLs to the principal once connectivity has converged
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub acl: bool,

    /// Principal receiving the baseline ACLs
    #[arg(long)]
    pub principal: Option<String>,

    /// AWS region (defaults to the region in the cluster ARN)
    #[arg(long)]
    pub region: Option<String>,

    /// Seconds between connectivity polls
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Polls before giving up on convergence
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Configuration file path
    #[arg(short, long, env = "MSK_ACCESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write Prometheus metrics to this file on exit
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Operator settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorConfig {
    /// AWS region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Principal receiving the baseline ACLs
    #[serde(default = "default_principal")]
    pub principal: String,

    /// Seconds between connectivity polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Polls before giving up on convergence
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Timeout for each data plane request
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,

    /// Kafka client id sent to the brokers
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus textfile output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,
}

fn default_principal() -> String {
    "User:admin".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    60
}

fn default_client_timeout_secs() -> u64 {
    30
}

fn default_client_id() -> String {
    "msk-access-operator".to_string()
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            region: None,
            principal: default_principal(),
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
            client_timeout_secs: default_client_timeout_secs(),
            client_id: default_client_id(),
            log_format: LogFormat::default(),
            metrics_file: None,
        }
    }
}

impl OperatorConfig {
    /// Load settings from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config: OperatorConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply command line overrides on top of file settings
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(region) = &cli.region {
            self.region = Some(region.clone());
        }
        if let Some(principal) = &cli.principal {
            self.principal = principal.clone();
        }
        if let Some(secs) = cli.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(attempts) = cli.max_attempts {
            self.max_attempts = attempts;
        }
        if let Some(format) = cli.log_format {
            self.log_format = format;
        }
        if let Some(path) = &cli.metrics_file {
            self.metrics_file = Some(path.clone());
        }
        self
    }

    /// Reject settings the reconcilers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::validation("Poll interval must be at least one second"));
        }
        if self.max_attempts == 0 {
            return Err(Error::validation("Max attempts must be at least 1"));
        }
        if self.client_timeout_secs == 0 {
            return Err(Error::validation("Client timeout must be at least one second"));
        }
        match self.principal.split_once(':') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {}
            _ => {
                return Err(Error::validation(format!(
                    "Principal '{}' must have the form Type:name (e.g. User:admin)",
                    self.principal
                )))
            }
        }
        Ok(())
    }

    /// Region from settings, falling back to the cluster ARN
    pub fn resolve_region(&self, cluster: &ClusterIdentity) -> Option<String> {
        self.region
            .clone()
            .or_else(|| cluster.region().map(str::to_string))
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

/// Exit code for a command line that did not parse.
///
/// Usage errors exit 1; `--help` and `--version` are reported through the
/// same error type and exit 0.
pub fn usage_exit_code(error: &clap::Error) -> u8 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

/// What one invocation is asked to do
#[derive(Clone, Debug)]
pub struct AccessRequest {
    pub cluster: ClusterIdentity,
    pub desired: TargetConnectivity,
    pub bootstrap_acls: bool,
}

impl Cli {
    /// Resolve the full configuration for this invocation
    pub fn load(&self) -> Result<(OperatorConfig, AccessRequest)> {
        if self.cluster.trim().is_empty() {
            return Err(Error::validation("A cluster ARN must be provided"));
        }

        let base = match &self.config {
            Some(path) => OperatorConfig::from_file(path)?,
            None => OperatorConfig::default(),
        };
        let config = base.merge_cli(self);
        config.validate()?;

        let request = AccessRequest {
            cluster: ClusterIdentity::new(self.cluster.trim()),
            desired: TargetConnectivity::from_public(self.public),
            bootstrap_acls: self.acl,
        };
        Ok((config, request))
    }
}
