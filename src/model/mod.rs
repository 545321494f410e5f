//! Domain types shared by the reconcilers and the plane adapters

mod acl;
mod connectivity;

pub use acl::*;
pub use connectivity::*;
