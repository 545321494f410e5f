//! MSK access operator
//!
//! Drives the public connectivity of an Amazon MSK cluster to a desired
//! state, waits for it to converge, and bootstraps baseline ACLs for an
//! administrative principal.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod error;
pub mod metrics;
pub mod model;
pub mod reconcilers;

pub use error::{Error, Result};
