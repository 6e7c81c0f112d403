//! Session Module
//!
//! Stateful firewall session descriptors. A forward flow exiting a
//! session-enabled interface (or accepted by a session-enabled VRF) installs
//! a `FirewallSessionTraceInfo` that short-circuits the normal ingress
//! pipeline for matching return traffic.

mod types;

pub use types::{
    match_session_return_flow, return_transformation, FirewallSessionTraceInfo, SessionAction,
    SessionMatchExpr, SessionScope,
};
