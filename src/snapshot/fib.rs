//! Per-VRF forwarding tables
//!
//! A FIB maps destination prefixes to sets of entries; resolution is
//! longest-prefix-match and can yield several entries (ECMP). Each entry is
//! one of: forward out an interface (with optional ARP next-hop IP),
//! delegate the lookup to another VRF, or discard (null route).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::types::Prefix;

/// Protocol that installed a route, reported in routing steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteProtocol {
    Connected,
    Local,
    Static,
    Bgp,
    Ospf,
}

/// Route metadata attached to a FIB entry, surfaced in `Step::Routing` for
/// transparency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteInfo {
    pub protocol: RouteProtocol,
    pub network: Prefix,
    pub next_hop_ip: Option<Ipv4Addr>,
}

/// The forwarding action of one FIB entry. Variant order defines the
/// deterministic branch-visit order (forward, then next-vrf, then null).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FibAction {
    Forward {
        interface: String,
        /// IP to ARP for; `None` (connected routes) defaults to the flow's
        /// destination IP.
        arp_ip: Option<Ipv4Addr>,
    },
    NextVrf {
        vrf: String,
    },
    NullRoute,
}

/// One FIB entry: an action plus the route that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FibEntry {
    pub action: FibAction,
    pub route: RouteInfo,
}

/// A per-(node, VRF) forwarding table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fib {
    entries: BTreeMap<Prefix, Vec<FibEntry>>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, prefix: Prefix, entry: FibEntry) {
        self.entries.entry(prefix).or_default().push(entry);
    }

    /// A FIB with a single entry forwarding the whole address space out of
    /// `interface` towards `arp_ip`.
    pub fn forwarding_all(interface: impl Into<String>, arp_ip: Option<Ipv4Addr>) -> Self {
        let mut fib = Self::new();
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        fib.add_entry(
            prefix,
            FibEntry {
                action: FibAction::Forward {
                    interface: interface.into(),
                    arp_ip,
                },
                route: RouteInfo {
                    protocol: RouteProtocol::Static,
                    network: prefix,
                    next_hop_ip: arp_ip,
                },
            },
        );
        fib
    }

    /// Longest-prefix-match resolution: all entries under the most specific
    /// prefix containing `ip`, in insertion order.
    pub fn resolve(&self, ip: Ipv4Addr) -> SmallVec<[&FibEntry; 4]> {
        let mut best_length: Option<u8> = None;
        let mut result: SmallVec<[&FibEntry; 4]> = SmallVec::new();
        for (prefix, entries) in &self.entries {
            if !prefix.contains(ip) {
                continue;
            }
            match best_length {
                Some(len) if prefix.length < len => continue,
                Some(len) if prefix.length == len => result.extend(entries.iter()),
                _ => {
                    best_length = Some(prefix.length);
                    result.clear();
                    result.extend(entries.iter());
                }
            }
        }
        result
    }
}
