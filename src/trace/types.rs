//! Trace output types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::flow::{Flow, FlowDiff, NodeInterface};
use crate::session::{FirewallSessionTraceInfo, SessionMatchExpr};
use crate::snapshot::RouteInfo;

/// Terminal outcome of a trace. Exactly one per trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Delivered to a VRF that owns the destination IP.
    Accepted,
    /// Dropped by an ingress-side filter.
    DeniedIn,
    /// Dropped by an egress-side filter.
    DeniedOut,
    /// The flow revisited a (node, VRF, flow) state.
    Loop,
    /// ARP for the destination failed on an interface with modeled
    /// neighbors, none of which replied.
    NeighborUnreachable,
    /// Left the network into a connected subnet containing the destination.
    DeliveredToSubnet,
    /// Left the modeled network towards an external destination.
    ExitsNetwork,
    /// Left the network but the destination IP is owned elsewhere in the
    /// snapshot, so the real-world outcome is unknown.
    InsufficientInfo,
    /// No route to the destination in the current VRF.
    NoRoute,
    /// Matched a route that discards traffic.
    NullRouted,
}

impl Disposition {
    /// Whether the flow plausibly reached its destination. Only successful
    /// traces produce a return flow.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            Disposition::Accepted | Disposition::DeliveredToSubnet | Disposition::ExitsNetwork
        )
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Outcome of an individual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Received,
    Originated,
    Accepted,
    Permitted,
    Denied,
    Forwarded,
    ForwardedToNextVrf,
    NoRoute,
    NullRouted,
    Transformed,
    Transmitted,
    SetupSession,
    MatchedSession,
    ExitsNetwork,
    DeliveredToSubnet,
    NeighborUnreachable,
    InsufficientInfo,
    Looped,
}

/// Which filter slot of the pipeline a filter step evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Ingress,
    PostTransformationIngress,
    PreTransformationEgress,
    Egress,
}

impl FilterKind {
    /// Disposition of a trace ended by a deny in this slot.
    pub fn denied_disposition(self) -> Disposition {
        match self {
            FilterKind::Ingress | FilterKind::PostTransformationIngress => Disposition::DeniedIn,
            FilterKind::PreTransformationEgress | FilterKind::Egress => Disposition::DeniedOut,
        }
    }
}

/// How a routing step resolved the flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardingDetail {
    ForwardedOutInterface {
        interface: String,
        /// IP the next hop is resolved through, when distinct from the
        /// flow's destination.
        next_hop_ip: Option<Ipv4Addr>,
    },
    DelegatedToNextVrf {
        vrf: String,
    },
    Discarded,
}

/// One event in a hop's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// The flow entered the node via an interface.
    EnterInterface {
        interface: NodeInterface,
        action: StepAction,
    },
    /// The flow originated in a VRF on this node.
    Originate { vrf: String, action: StepAction },
    /// A named filter was evaluated.
    Filter {
        filter: String,
        kind: FilterKind,
        action: StepAction,
    },
    /// A FIB lookup selected one forwarding branch.
    Routing {
        vrf: String,
        routes: Vec<RouteInfo>,
        forwarding: ForwardingDetail,
        action: StepAction,
    },
    /// A transformation rewrote header fields. Empty diffs mean the
    /// transformation matched but changed nothing.
    Transformation {
        diffs: Vec<FlowDiff>,
        action: StepAction,
    },
    /// The flow left the node via an interface. `transformed_flow` carries
    /// the header as transmitted when it differs from the hop's input.
    ExitInterface {
        interface: NodeInterface,
        transformed_flow: Option<Flow>,
        action: StepAction,
    },
    /// The flow was delivered to this node via an interface.
    Inbound {
        interface: NodeInterface,
        action: StepAction,
    },
    /// A firewall session was installed for the flow's return traffic.
    SetupSession {
        session: FirewallSessionTraceInfo,
        action: StepAction,
    },
    /// An incoming flow matched an installed session.
    MatchSession {
        criteria: SessionMatchExpr,
        action: StepAction,
    },
    /// ARP resolution failed on the egress interface.
    ArpError {
        interface: NodeInterface,
        resolved_ip: Ipv4Addr,
        action: StepAction,
    },
    /// The flow left the modeled network.
    Delivered {
        interface: NodeInterface,
        resolved_ip: Ipv4Addr,
        action: StepAction,
    },
    /// The flow revisited an earlier forwarding state.
    Loop,
}

impl Step {
    pub fn action(&self) -> StepAction {
        match self {
            Step::EnterInterface { action, .. }
            | Step::Originate { action, .. }
            | Step::Filter { action, .. }
            | Step::Routing { action, .. }
            | Step::Transformation { action, .. }
            | Step::ExitInterface { action, .. }
            | Step::Inbound { action, .. }
            | Step::SetupSession { action, .. }
            | Step::MatchSession { action, .. }
            | Step::ArpError { action, .. }
            | Step::Delivered { action, .. } => *action,
            Step::Loop => StepAction::Looped,
        }
    }
}

/// All steps the flow took on one node. A trace may visit the same node
/// several times (distinct hops).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub node: String,
    pub steps: Vec<Step>,
}

impl Hop {
    pub fn new(node: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            node: node.into(),
            steps,
        }
    }
}

/// One complete root-to-terminal path through the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub disposition: Disposition,
    pub hops: Vec<Hop>,
}

impl Trace {
    pub fn new(disposition: Disposition, hops: Vec<Hop>) -> Self {
        Self { disposition, hops }
    }
}

/// A trace bundled with the reverse flow for successful outcomes and the
/// firewall sessions the forward flow installed along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAndReverseFlow {
    pub trace: Trace,
    /// Present iff the disposition is successful. Starts at the terminal
    /// point with the post-transformation header mirrored.
    pub reverse_flow: Option<Flow>,
    pub new_sessions: Vec<FirewallSessionTraceInfo>,
}
