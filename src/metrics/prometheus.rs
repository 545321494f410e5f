//! Prometheus metrics definitions and textfile output

use std::path::Path;

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use tracing::info;

use crate::error::{Error, Result};

lazy_static::lazy_static! {
    /// Total number of phase runs
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "msk_access_operator_reconciliations_total",
        "Total number of reconciliations by phase",
        &["phase"]
    ).unwrap();

    /// Total number of failed phase runs
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "msk_access_operator_reconciliation_errors_total",
        "Total number of reconciliation errors by phase and error kind",
        &["phase", "kind"]
    ).unwrap();

    /// Phase duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "msk_access_operator_reconcile_duration_seconds",
        "Duration of reconciliation phases in seconds",
        &["phase"],
        vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]
    ).unwrap();

    /// Connectivity inspections made while waiting for convergence
    pub static ref CONNECTIVITY_POLLS: Counter = register_counter!(
        "msk_access_operator_connectivity_polls_total",
        "Connectivity inspections made while waiting for convergence"
    ).unwrap();

    /// Stale version tokens reported by the control plane
    pub static ref VERSION_CONFLICTS: Counter = register_counter!(
        "msk_access_operator_version_conflicts_total",
        "Connectivity updates rejected because of a stale cluster version"
    ).unwrap();

    /// ACL entries by outcome
    pub static ref ACL_GRANTS: CounterVec = register_counter_vec!(
        "msk_access_operator_acl_grants_total",
        "Baseline ACL entries by outcome",
        &["outcome"]
    ).unwrap();
}

/// Encode all registered metrics in text exposition format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::config(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| Error::config(format!("Metrics are not valid UTF-8: {}", e)))
}

/// Write metrics to `path`, replacing it atomically
pub fn write_textfile(path: &Path) -> Result<()> {
    let content = render()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to move metrics into {:?}: {}", path, e),
        ))
    })?;
    info!(path = ?path, "Wrote metrics textfile");
    Ok(())
}
