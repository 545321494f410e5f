//! Prometheus metrics for the MSK access operator
//!
//! A run is short-lived, so metrics are written to a textfile for the
//! node exporter instead of being served over HTTP.

mod prometheus;

pub use prometheus::*;
