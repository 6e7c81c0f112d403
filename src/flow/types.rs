//! Flow types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// IP protocol of a flow. Only TCP and UDP can carry firewall sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
    Other(u8),
}

impl IpProtocol {
    /// Whether stateful firewall sessions can be established for this protocol.
    pub fn has_sessions(self) -> bool {
        matches!(self, IpProtocol::Tcp | IpProtocol::Udp)
    }
}

/// A (node, interface) pair identifying one end of an L3 edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeInterface {
    pub node: String,
    pub interface: String,
}

impl NodeInterface {
    pub fn new(node: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for NodeInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.interface)
    }
}

/// An immutable packet header plus its ingress location.
///
/// Value-equal and hashable; any transformation (NAT) produces a new `Flow`.
/// Exactly one of `ingress_vrf` / `ingress_interface` is set: a flow either
/// originates in a VRF on the ingress node or enters via an interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flow {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub ip_protocol: IpProtocol,
    pub ingress_node: String,
    pub ingress_vrf: Option<String>,
    pub ingress_interface: Option<String>,
    /// Opaque caller tag carried through unchanged.
    pub tag: Option<String>,
}

impl Flow {
    pub fn builder() -> FlowBuilder {
        FlowBuilder::default()
    }
}

/// Builder for `Flow`. Defaults: 0.0.0.0 addresses, port 0, TCP.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    ip_protocol: IpProtocol,
    ingress_node: String,
    ingress_vrf: Option<String>,
    ingress_interface: Option<String>,
    tag: Option<String>,
}

impl Default for FlowBuilder {
    fn default() -> Self {
        Self {
            src_ip: Ipv4Addr::UNSPECIFIED,
            dst_ip: Ipv4Addr::UNSPECIFIED,
            src_port: 0,
            dst_port: 0,
            ip_protocol: IpProtocol::Tcp,
            ingress_node: String::new(),
            ingress_vrf: None,
            ingress_interface: None,
            tag: None,
        }
    }
}

impl FlowBuilder {
    pub fn src_ip(mut self, ip: Ipv4Addr) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: Ipv4Addr) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn ip_protocol(mut self, protocol: IpProtocol) -> Self {
        self.ip_protocol = protocol;
        self
    }

    pub fn ingress_node(mut self, node: impl Into<String>) -> Self {
        self.ingress_node = node.into();
        self
    }

    pub fn ingress_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.ingress_vrf = Some(vrf.into());
        self
    }

    pub fn ingress_interface(mut self, interface: impl Into<String>) -> Self {
        self.ingress_interface = Some(interface.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn build(self) -> Flow {
        Flow {
            src_ip: self.src_ip,
            dst_ip: self.dst_ip,
            src_port: self.src_port,
            dst_port: self.dst_port,
            ip_protocol: self.ip_protocol,
            ingress_node: self.ingress_node,
            ingress_vrf: self.ingress_vrf,
            ingress_interface: self.ingress_interface,
            tag: self.tag,
        }
    }
}

/// One changed header field, reported in transformation steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDiff {
    SrcIp { before: Ipv4Addr, after: Ipv4Addr },
    DstIp { before: Ipv4Addr, after: Ipv4Addr },
    SrcPort { before: u16, after: u16 },
    DstPort { before: u16, after: u16 },
}

/// Compute the field-by-field differences between two flows.
pub fn flow_diffs(before: &Flow, after: &Flow) -> Vec<FlowDiff> {
    let mut diffs = Vec::new();
    if before.src_ip != after.src_ip {
        diffs.push(FlowDiff::SrcIp {
            before: before.src_ip,
            after: after.src_ip,
        });
    }
    if before.dst_ip != after.dst_ip {
        diffs.push(FlowDiff::DstIp {
            before: before.dst_ip,
            after: after.dst_ip,
        });
    }
    if before.src_port != after.src_port {
        diffs.push(FlowDiff::SrcPort {
            before: before.src_port,
            after: after.src_port,
        });
    }
    if before.dst_port != after.dst_port {
        diffs.push(FlowDiff::DstPort {
            before: before.dst_port,
            after: after.dst_port,
        });
    }
    diffs
}

/// Construct the return flow for a forward flow terminating at the given
/// point: src/dst ip and port are swapped, and the return flow ingresses at
/// the terminal node's VRF (accepted flows) or interface (flows leaving the
/// modeled network).
pub fn return_flow(
    forward: &Flow,
    node: &str,
    vrf: Option<&str>,
    interface: Option<&str>,
) -> Flow {
    debug_assert!(
        vrf.is_some() ^ interface.is_some(),
        "return flow must ingress at exactly one of VRF or interface"
    );
    Flow {
        src_ip: forward.dst_ip,
        dst_ip: forward.src_ip,
        src_port: forward.dst_port,
        dst_port: forward.src_port,
        ip_protocol: forward.ip_protocol,
        ingress_node: node.to_string(),
        ingress_vrf: vrf.map(str::to_string),
        ingress_interface: interface.map(str::to_string),
        tag: forward.tag.clone(),
    }
}
