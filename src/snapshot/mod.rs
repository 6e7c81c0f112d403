//! Snapshot Module
//!
//! The read-only forwarding state the engine consumes: node configurations
//! with VRFs and interfaces, per-VRF FIBs, named ACLs, packet
//! transformations, session-eligibility descriptors and L3 adjacency.
//!
//! The engine treats evaluation as opaque capabilities: `Acl::check(flow)`
//! yields a permit/deny verdict and `Transformation::apply(flow)` yields a
//! new flow; nothing in the tracer depends on their internals.

mod acl;
mod fib;
mod transformation;
mod types;

pub use acl::{Acl, AclLine, HeaderMatch, LineAction};
pub use fib::{Fib, FibAction, FibEntry, RouteInfo, RouteProtocol};
pub use transformation::{Transformation, TransformationOp};
pub use types::{
    FirewallSessionInterfaceInfo, FirewallSessionVrfInfo, InterfaceConfig, NetworkSnapshot,
    NodeConfig, Prefix, VrfConfig,
};
