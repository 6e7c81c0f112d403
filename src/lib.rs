//! fibtrace: snapshot-based traceroute simulation engine
//!
//! Given a static snapshot of a network's computed forwarding state, this
//! crate deterministically simulates how an arbitrary packet ("flow") would
//! traverse the modeled network, hop by hop, and reports the exact outcome
//! without any live traffic:
//! - Flow: immutable packet header + ingress location
//! - Snapshot: per-node-per-VRF FIBs, ACLs, transformations, L3 adjacency
//! - Trace: the hop/step/disposition output vocabulary
//! - Session: stateful firewall session descriptors and return-flow matching
//! - Dag: shared-subtree trace storage with breadcrumb-gated node reuse
//! - Tracer: the per-hop simulation state machine
//! - Engine: batch orchestration across independent flows

pub mod flow;
pub mod snapshot;
pub mod session;
pub mod trace;
pub mod dag;
pub mod tracer;
pub mod engine;

// Re-exports for convenience
pub use flow::{Flow, FlowBuilder, FlowDiff, IpProtocol, NodeInterface};
pub use snapshot::{
    Acl, AclLine, Fib, FibAction, FibEntry, FirewallSessionInterfaceInfo,
    FirewallSessionVrfInfo, HeaderMatch, InterfaceConfig, LineAction, NetworkSnapshot,
    NodeConfig, Prefix, RouteInfo, RouteProtocol, Transformation, TransformationOp, VrfConfig,
};
pub use session::{
    FirewallSessionTraceInfo, SessionAction, SessionMatchExpr, SessionScope,
};
pub use trace::{
    Disposition, FilterKind, ForwardingDetail, Hop, Step, StepAction, Trace,
    TraceAndReverseFlow,
};
pub use dag::{Breadcrumb, DagTraceRecorder, HopInfo, NodeKey, TraceDag};
pub use engine::{TracerouteEngine, TracerouteError};
