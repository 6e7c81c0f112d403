//! Snapshot configuration types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use crate::flow::NodeInterface;

use super::acl::Acl;
use super::fib::Fib;
use super::transformation::Transformation;

/// An IPv4 prefix (network address + length).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Prefix {
    pub address: Ipv4Addr,
    pub length: u8,
}

impl Prefix {
    pub fn new(address: Ipv4Addr, length: u8) -> Self {
        debug_assert!(length <= 32, "prefix length must be at most 32");
        Self { address, length }
    }

    /// The /32 prefix containing only `address`.
    pub fn host(address: Ipv4Addr) -> Self {
        Self {
            address,
            length: 32,
        }
    }

    fn mask(self) -> u32 {
        if self.length == 0 {
            0
        } else {
            u32::MAX << (32 - self.length)
        }
    }

    pub fn contains(self, ip: Ipv4Addr) -> bool {
        let mask = self.mask();
        (u32::from(self.address) & mask) == (u32::from(ip) & mask)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

/// Session eligibility descriptor for an interface. A flow exiting an
/// eligible interface sets up a session whose return traffic is accepted on
/// any of `session_interfaces`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSessionInterfaceInfo {
    /// Interfaces on which return traffic matches the session.
    pub session_interfaces: BTreeSet<String>,
    /// ACL applied to matched return traffic on ingress, by name.
    pub incoming_acl: Option<String>,
    /// ACL applied when a matched session forwards traffic out, by name.
    pub outgoing_acl: Option<String>,
    /// When true, matched return traffic is routed via a fresh FIB lookup
    /// after the session transformation instead of using the recorded
    /// reverse path.
    pub fib_lookup: bool,
}

/// Per-VRF session policy: when set, a flow accepted by this VRF sets up a
/// session matching return traffic originating from the VRF. Matched return
/// traffic is transformed, then routed with a fresh FIB lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSessionVrfInfo;

/// One interface of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Name of the VRF this interface belongs to.
    pub vrf: String,
    /// Addresses owned by this interface (used for VRF acceptance and ARP).
    pub addresses: Vec<Ipv4Addr>,
    /// Directly connected subnets (used by the unmodeled-space disposition
    /// policy).
    pub connected_subnets: Vec<Prefix>,
    pub incoming_filter: Option<String>,
    pub incoming_transformation: Option<Transformation>,
    pub post_transformation_incoming_filter: Option<String>,
    pub pre_transformation_outgoing_filter: Option<String>,
    pub outgoing_transformation: Option<Transformation>,
    pub outgoing_filter: Option<String>,
    pub firewall_session: Option<FirewallSessionInterfaceInfo>,
}

impl InterfaceConfig {
    pub fn new(vrf: impl Into<String>) -> Self {
        Self {
            vrf: vrf.into(),
            ..Self::default()
        }
    }
}

/// One VRF of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VrfConfig {
    pub fib: Fib,
    pub firewall_session_vrf: Option<FirewallSessionVrfInfo>,
}

/// One node of the network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub vrfs: BTreeMap<String, VrfConfig>,
    pub interfaces: BTreeMap<String, InterfaceConfig>,
    pub acls: BTreeMap<String, Acl>,
}

/// A static snapshot of the network's computed forwarding state. Read-only
/// during simulation and shared across all flows of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub nodes: BTreeMap<String, NodeConfig>,
    /// L3 adjacency: node -> interface -> neighbor interfaces, in
    /// deterministic order.
    pub edges: BTreeMap<String, BTreeMap<String, BTreeSet<NodeInterface>>>,
}

impl NetworkSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.get(name)
    }

    pub fn interface(&self, node: &str, interface: &str) -> Option<&InterfaceConfig> {
        self.nodes.get(node)?.interfaces.get(interface)
    }

    pub fn fib(&self, node: &str, vrf: &str) -> Option<&Fib> {
        self.nodes.get(node)?.vrfs.get(vrf).map(|v| &v.fib)
    }

    pub fn acl(&self, node: &str, name: &str) -> Option<&Acl> {
        self.nodes.get(node)?.acls.get(name)
    }

    /// Add a bidirectional L3 edge between two interfaces.
    pub fn add_edge(&mut self, a: NodeInterface, b: NodeInterface) {
        self.edges
            .entry(a.node.clone())
            .or_default()
            .entry(a.interface.clone())
            .or_default()
            .insert(b.clone());
        self.edges
            .entry(b.node)
            .or_default()
            .entry(b.interface)
            .or_default()
            .insert(a);
    }

    /// Neighbor interfaces reachable out of (node, interface).
    pub fn interface_neighbors(
        &self,
        node: &str,
        interface: &str,
    ) -> impl Iterator<Item = &NodeInterface> {
        self.edges
            .get(node)
            .and_then(|m| m.get(interface))
            .into_iter()
            .flatten()
    }

    pub fn has_neighbors(&self, node: &str, interface: &str) -> bool {
        self.interface_neighbors(node, interface).next().is_some()
    }

    /// Whether (node, interface) replies to ARP for `ip`: it does iff it
    /// owns the address.
    pub fn replies_to_arp(&self, node: &str, interface: &str, ip: Ipv4Addr) -> bool {
        self.interface(node, interface)
            .map(|i| i.addresses.contains(&ip))
            .unwrap_or(false)
    }

    /// Whether `vrf` on `node` accepts packets destined to `ip` (one of its
    /// interfaces owns the address).
    pub fn vrf_accepts_ip(&self, node: &str, vrf: &str, ip: Ipv4Addr) -> bool {
        self.interface_accepting_ip(node, vrf, ip).is_some()
    }

    /// The interface in `vrf` on `node` that owns `ip`, if any.
    pub fn interface_accepting_ip(&self, node: &str, vrf: &str, ip: Ipv4Addr) -> Option<&str> {
        let node_cfg = self.nodes.get(node)?;
        node_cfg
            .interfaces
            .iter()
            .find(|(_, i)| i.vrf == vrf && i.addresses.contains(&ip))
            .map(|(name, _)| name.as_str())
    }

    /// The first interface in `vrf` on `node`, if any. Used to attribute an
    /// accepting interface when a session accepts a flow whose destination
    /// is not owned by the VRF.
    pub fn any_interface_in_vrf(&self, node: &str, vrf: &str) -> Option<&str> {
        let node_cfg = self.nodes.get(node)?;
        node_cfg
            .interfaces
            .iter()
            .find(|(_, i)| i.vrf == vrf)
            .map(|(name, _)| name.as_str())
    }

    /// Whether any interface anywhere in the snapshot owns `ip`.
    pub fn ip_owned_anywhere(&self, ip: Ipv4Addr) -> bool {
        self.nodes
            .values()
            .flat_map(|n| n.interfaces.values())
            .any(|i| i.addresses.contains(&ip))
    }
}
