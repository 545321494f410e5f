//! Reconcilers for MSK cluster access
//!
//! This module contains the business logic of the two phases:
//! - Driving public connectivity to the desired state and waiting for it
//! - Granting the baseline ACLs once connectivity has converged

pub mod acl;
pub mod connectivity;

pub use acl::{AclBootstrapper, BootstrapReport};
pub use connectivity::{
    ConnectivityInspector, ConnectivityReconciler, ReconcileOptions, ReconcileOutcome,
};
