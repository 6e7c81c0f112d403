//! Shared per-batch simulation context

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::flow::Flow;
use crate::session::FirewallSessionTraceInfo;
use crate::snapshot::NetworkSnapshot;
use crate::trace::Disposition;

/// Read-only state shared by every flow of one batch: the snapshot, the
/// established sessions indexed by node, and the batch options.
pub struct TracerouteContext<'a> {
    pub(crate) snapshot: &'a NetworkSnapshot,
    sessions_by_node: FxHashMap<&'a str, Vec<&'a FirewallSessionTraceInfo>>,
    pub(crate) ignore_filters: bool,
    traces_recorded: AtomicU64,
}

impl<'a> TracerouteContext<'a> {
    pub fn new(
        snapshot: &'a NetworkSnapshot,
        sessions: &'a [FirewallSessionTraceInfo],
        ignore_filters: bool,
    ) -> Self {
        let mut sessions_by_node: FxHashMap<&str, Vec<&FirewallSessionTraceInfo>> =
            FxHashMap::default();
        for session in sessions {
            sessions_by_node
                .entry(session.hostname.as_str())
                .or_default()
                .push(session);
        }
        Self {
            snapshot,
            sessions_by_node,
            ignore_filters,
            traces_recorded: AtomicU64::new(0),
        }
    }

    /// Number of terminal traces recorded across the batch so far.
    pub fn traces_recorded(&self) -> u64 {
        self.traces_recorded.load(Ordering::Relaxed)
    }

    pub(crate) fn count_trace(&self) {
        self.traces_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// The established session intercepting `flow` at `node`, where the flow
    /// enters the node via `ingress_interface` at this hop (or originates
    /// there in `vrf` when `None`). At most one session may match a given
    /// flow at a node.
    pub(crate) fn matching_session(
        &self,
        node: &str,
        ingress_interface: Option<&str>,
        vrf: &str,
        flow: &Flow,
    ) -> Option<&'a FirewallSessionTraceInfo> {
        let matched: SmallVec<[&FirewallSessionTraceInfo; 2]> = self
            .sessions_by_node
            .get(node)
            .into_iter()
            .flatten()
            .filter(|s| s.scope.covers(ingress_interface, vrf) && s.match_criteria.matches(flow))
            .copied()
            .collect();
        assert!(
            matched.len() <= 1,
            "flow matched more than one session at {node}"
        );
        matched.first().copied()
    }

    /// Disposition for a flow leaving the modeled network out of
    /// (node, interface) towards `dst_ip`.
    pub(crate) fn compute_disposition(
        &self,
        node: &str,
        interface: &str,
        dst_ip: Ipv4Addr,
    ) -> Disposition {
        let has_edges = self.snapshot.has_neighbors(node, interface);
        let in_connected_subnet = self
            .snapshot
            .interface(node, interface)
            .is_some_and(|i| i.connected_subnets.iter().any(|p| p.contains(dst_ip)));
        if in_connected_subnet {
            if has_edges {
                Disposition::NeighborUnreachable
            } else {
                Disposition::DeliveredToSubnet
            }
        } else if self.snapshot.ip_owned_anywhere(dst_ip) {
            Disposition::InsufficientInfo
        } else {
            Disposition::ExitsNetwork
        }
    }
}
