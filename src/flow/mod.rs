//! Flow Module
//!
//! The immutable packet-header value types: `Flow` (5-tuple + ingress
//! location + opaque tag), the builder used to construct flows, reverse-flow
//! derivation for returnable dispositions, and `FlowDiff` reporting for
//! transformations.

mod types;

pub use types::*;
