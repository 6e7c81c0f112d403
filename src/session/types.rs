//! Session types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use crate::flow::{Flow, IpProtocol, NodeInterface};
use crate::snapshot::{Transformation, TransformationOp};

/// Exact 5-tuple matcher for session return traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionMatchExpr {
    pub ip_protocol: IpProtocol,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl SessionMatchExpr {
    pub fn matches(&self, flow: &Flow) -> bool {
        self.ip_protocol == flow.ip_protocol
            && self.src_ip == flow.src_ip
            && self.dst_ip == flow.dst_ip
            && self.src_port.map_or(true, |p| p == flow.src_port)
            && self.dst_port.map_or(true, |p| p == flow.dst_port)
    }
}

/// Where a session applies on its node: to flows entering any of a set of
/// interfaces, or to flows originating in a VRF.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    IncomingInterfaces(BTreeSet<String>),
    OriginatingVrf(String),
}

impl SessionScope {
    /// Whether a flow entering the session's node at the current hop via
    /// `ingress_interface` (or originating there in `vrf` when `None`) falls
    /// within this scope.
    pub fn covers(&self, ingress_interface: Option<&str>, vrf: &str) -> bool {
        match self {
            SessionScope::IncomingInterfaces(interfaces) => {
                ingress_interface.is_some_and(|i| interfaces.contains(i))
            }
            SessionScope::OriginatingVrf(scope_vrf) => {
                ingress_interface.is_none() && scope_vrf == vrf
            }
        }
    }
}

/// What a matched session does with the return flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    /// Deliver to the session's node.
    Accept,
    /// FIB lookup on the flow after the session transformation.
    PostNatFibLookup,
    /// Bypass routing: send straight out a recorded interface, optionally
    /// towards a recorded neighbor.
    ForwardOutInterface {
        outgoing_interface: String,
        next_hop: Option<NodeInterface>,
    },
}

/// An installed session: established on `hostname` by a forward flow, it
/// intercepts in-scope return traffic matching `match_criteria`, applies
/// `transformation` (the inverse of the forward NAT), then performs
/// `action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirewallSessionTraceInfo {
    pub hostname: String,
    pub action: SessionAction,
    pub scope: SessionScope,
    pub match_criteria: SessionMatchExpr,
    pub transformation: Option<Transformation>,
}

/// Match criteria for the return direction of `forward`: source and
/// destination swapped, ports included for port-carrying protocols.
pub fn match_session_return_flow(forward: &Flow) -> SessionMatchExpr {
    let with_ports = forward.ip_protocol.has_sessions();
    SessionMatchExpr {
        ip_protocol: forward.ip_protocol,
        src_ip: forward.dst_ip,
        dst_ip: forward.src_ip,
        src_port: with_ports.then_some(forward.dst_port),
        dst_port: with_ports.then_some(forward.src_port),
    }
}

/// The session transformation undoing the forward-direction NAT: for each
/// header field the forward pipeline rewrote, the return flow's mirrored
/// field is restored to the original value. `None` when the forward flow was
/// not transformed.
pub fn return_transformation(original: &Flow, transformed: &Flow) -> Option<Transformation> {
    let mut ops = Vec::new();
    if original.src_ip != transformed.src_ip {
        ops.push(TransformationOp::SetDstIp(original.src_ip));
    }
    if original.dst_ip != transformed.dst_ip {
        ops.push(TransformationOp::SetSrcIp(original.dst_ip));
    }
    if original.src_port != transformed.src_port {
        ops.push(TransformationOp::SetDstPort(original.src_port));
    }
    if original.dst_port != transformed.dst_port {
        ops.push(TransformationOp::SetSrcPort(original.dst_port));
    }
    if ops.is_empty() {
        None
    } else {
        Some(Transformation::always(ops))
    }
}
