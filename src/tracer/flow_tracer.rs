//! Depth-first flow exploration

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::rc::Rc;

use crate::dag::{Breadcrumb, DagTraceRecorder, HopInfo, TraceDag};
use crate::engine::TracerouteContext;
use crate::flow::{return_flow, Flow, NodeInterface};
use crate::session::{
    match_session_return_flow, return_transformation, FirewallSessionTraceInfo, SessionAction,
    SessionScope,
};
use crate::snapshot::{FibAction, LineAction, RouteInfo, Transformation};
use crate::trace::{Disposition, FilterKind, ForwardingDetail, Hop, Step, StepAction};

/// Mutable state of one exploration branch. Branch points clone it, so
/// sibling branches never observe each other's breadcrumbs or rewrites.
#[derive(Clone)]
struct PathState {
    node: String,
    vrf: String,
    /// Interface the flow entered through; `None` when it originates here.
    ingress_interface: Option<String>,
    /// The (node, interface) the previous hop transmitted out of.
    last_hop: Option<NodeInterface>,
    /// The flow as it entered this hop; identity of the hop's DAG node and
    /// baseline for session transformation inversion.
    original_flow: Flow,
    current_flow: Flow,
    /// Steps of the hop currently being built.
    steps: Vec<Step>,
    /// Completed hops from the root.
    hops: Vec<HopInfo>,
    /// Breadcrumbs pushed anywhere on this path.
    visited: FxHashSet<Rc<Breadcrumb>>,
    /// Breadcrumb pushed during this hop, if any.
    crumb: Option<Rc<Breadcrumb>>,
    /// Session installed during this hop, if any.
    session: Option<FirewallSessionTraceInfo>,
    /// Set once an established session took over forwarding: the egress
    /// filter/NAT/session-setup pipeline no longer applies.
    session_mode: bool,
}

impl PathState {
    /// Close the current hop and append it to the path.
    fn seal(&mut self, make: impl FnOnce(Hop, Flow) -> HopInfo) {
        let hop = Hop::new(self.node.clone(), std::mem::take(&mut self.steps));
        let mut info = make(hop, self.original_flow.clone());
        if let Some(crumb) = self.crumb.take() {
            info = info.with_breadcrumb(crumb);
        }
        if let Some(session) = self.session.take() {
            info = info.with_session(session);
        }
        self.hops.push(info);
    }
}

/// Simulates all forwarding branches of a single flow against the shared
/// batch context, producing the flow's trace DAG.
pub struct FlowTracer<'a> {
    ctx: &'a TracerouteContext<'a>,
    recorder: DagTraceRecorder,
}

impl<'a> FlowTracer<'a> {
    pub fn new(ctx: &'a TracerouteContext<'a>) -> Self {
        Self {
            ctx,
            recorder: DagTraceRecorder::new(),
        }
    }

    /// Explore `flow` exhaustively. The flow's ingress location must have
    /// been validated against the snapshot.
    pub fn trace(mut self, flow: &Flow) -> TraceDag {
        let vrf = match (&flow.ingress_vrf, &flow.ingress_interface) {
            (Some(vrf), _) => Some(vrf.clone()),
            (None, Some(interface)) => self
                .ctx
                .snapshot
                .interface(&flow.ingress_node, interface)
                .map(|i| i.vrf.clone()),
            (None, None) => None,
        };
        if let Some(vrf) = vrf {
            self.process_hop(PathState {
                node: flow.ingress_node.clone(),
                vrf,
                ingress_interface: flow.ingress_interface.clone(),
                last_hop: None,
                original_flow: flow.clone(),
                current_flow: flow.clone(),
                steps: Vec::new(),
                hops: Vec::new(),
                visited: FxHashSet::default(),
                crumb: None,
                session: None,
                session_mode: false,
            });
        }
        self.recorder.build()
    }

    fn process_hop(&mut self, mut st: PathState) {
        match st.ingress_interface.clone() {
            None => {
                st.steps.push(Step::Originate {
                    vrf: st.vrf.clone(),
                    action: StepAction::Originated,
                });
                let Some(st) = self.process_sessions(st) else {
                    return;
                };
                self.lookup_and_accept(st);
            }
            Some(ingress) => {
                st.steps.push(Step::EnterInterface {
                    interface: NodeInterface::new(&st.node, &ingress),
                    action: StepAction::Received,
                });
                let Some(mut st) = self.process_sessions(st) else {
                    return;
                };
                let cfg = self.ctx.snapshot.interface(&st.node, &ingress);
                let incoming_filter = cfg.and_then(|c| c.incoming_filter.as_deref());
                if self.apply_filter(&mut st, incoming_filter, FilterKind::Ingress)
                    == LineAction::Deny
                {
                    self.build_denied_trace(st, FilterKind::Ingress);
                    return;
                }
                self.apply_transformation(&mut st, cfg.and_then(|c| c.incoming_transformation.as_ref()));
                let post_filter = cfg.and_then(|c| c.post_transformation_incoming_filter.as_deref());
                if self.apply_filter(&mut st, post_filter, FilterKind::PostTransformationIngress)
                    == LineAction::Deny
                {
                    self.build_denied_trace(st, FilterKind::PostTransformationIngress);
                    return;
                }
                self.lookup_and_accept(st);
            }
        }
    }

    /// Check an established session before the regular ingress pipeline.
    /// Returns the state back when no session intercepts the flow.
    fn process_sessions(&mut self, mut st: PathState) -> Option<PathState> {
        let Some(session) = self.ctx.matching_session(
            &st.node,
            st.ingress_interface.as_deref(),
            &st.vrf,
            &st.current_flow,
        ) else {
            return Some(st);
        };
        let session = session.clone();
        st.steps.push(Step::MatchSession {
            criteria: session.match_criteria.clone(),
            action: StepAction::MatchedSession,
        });
        // Interface-scope sessions carry the scope interface's session
        // ingress ACL.
        if matches!(session.scope, SessionScope::IncomingInterfaces(_)) {
            if let Some(ingress) = st.ingress_interface.clone() {
                let acl = self
                    .ctx
                    .snapshot
                    .interface(&st.node, &ingress)
                    .and_then(|i| i.firewall_session.as_ref())
                    .and_then(|fs| fs.incoming_acl.as_deref());
                if self.apply_filter(&mut st, acl, FilterKind::Ingress) == LineAction::Deny {
                    self.build_denied_trace(st, FilterKind::Ingress);
                    return None;
                }
            }
        }
        self.apply_transformation(&mut st, session.transformation.as_ref());
        match &session.action {
            SessionAction::Accept => {
                self.build_accept_trace(st);
            }
            SessionAction::PostNatFibLookup => {
                st.session_mode = true;
                self.lookup_and_accept(st);
            }
            SessionAction::ForwardOutInterface {
                outgoing_interface,
                next_hop,
            } => {
                // Loop detection on the pre-transformation flow: session
                // forwarding bypasses the FIB, so the breadcrumb is placed
                // here instead.
                let crumb = Rc::new(Breadcrumb::new(
                    st.node.clone(),
                    st.vrf.clone(),
                    st.original_flow.clone(),
                ));
                if st.visited.contains(&crumb) {
                    self.build_loop_trace(st, crumb);
                    return None;
                }
                st.visited.insert(crumb.clone());
                st.crumb = Some(crumb);
                let acl = self
                    .ctx
                    .snapshot
                    .interface(&st.node, outgoing_interface)
                    .and_then(|i| i.firewall_session.as_ref())
                    .and_then(|fs| fs.outgoing_acl.as_deref());
                if self.apply_filter(&mut st, acl, FilterKind::Egress) == LineAction::Deny {
                    self.build_denied_trace(st, FilterKind::Egress);
                    return None;
                }
                self.push_exit_step(&mut st, outgoing_interface);
                match next_hop {
                    None => {
                        let dst_ip = st.current_flow.dst_ip;
                        self.build_unmodeled_space_trace(st, outgoing_interface, dst_ip);
                    }
                    Some(next_hop) => {
                        // Delivered straight to the recorded neighbor.
                        st.seal(HopInfo::forwarded);
                        if self.recorder.try_record_partial_trace(&st.hops) {
                            let out = NodeInterface::new(&st.node, outgoing_interface);
                            self.fork_follow_edge(&st, &out, next_hop);
                        }
                    }
                }
            }
        }
        None
    }

    /// Accept check against the current VRF, then FIB resolution.
    fn lookup_and_accept(&mut self, st: PathState) {
        if self
            .ctx
            .snapshot
            .vrf_accepts_ip(&st.node, &st.vrf, st.current_flow.dst_ip)
        {
            self.build_accept_trace(st);
        } else {
            let mut intra_hop = Vec::new();
            self.fib_lookup(st, &mut intra_hop);
        }
    }

    /// Resolve the current flow in `st.vrf` and fan out one branch per
    /// distinct FIB action, in the action type's order. `intra_hop` tracks
    /// next-VRF delegations within this hop.
    fn fib_lookup(&mut self, mut st: PathState, intra_hop: &mut Vec<Rc<Breadcrumb>>) {
        let crumb = Rc::new(Breadcrumb::new(
            st.node.clone(),
            st.vrf.clone(),
            st.current_flow.clone(),
        ));
        if st.visited.contains(&crumb) || intra_hop.contains(&crumb) {
            self.build_loop_trace(st, crumb);
            return;
        }
        if intra_hop.is_empty() {
            st.visited.insert(crumb.clone());
            st.crumb = Some(crumb.clone());
        }
        let dst_ip = st.current_flow.dst_ip;
        let entries = match self.ctx.snapshot.fib(&st.node, &st.vrf) {
            Some(fib) => fib.resolve(dst_ip),
            None => SmallVec::new(),
        };
        if entries.is_empty() {
            self.build_no_route_trace(st);
            return;
        }
        // Entries sharing an action become one branch whose routing step
        // lists all candidate routes.
        let mut branches: BTreeMap<&FibAction, Vec<RouteInfo>> = BTreeMap::new();
        for entry in &entries {
            branches
                .entry(&entry.action)
                .or_default()
                .push(entry.route.clone());
        }
        for (action, routes) in branches {
            let mut branch = st.clone();
            match action {
                FibAction::Forward { interface, arp_ip } => {
                    branch.steps.push(Step::Routing {
                        vrf: branch.vrf.clone(),
                        routes,
                        forwarding: ForwardingDetail::ForwardedOutInterface {
                            interface: interface.clone(),
                            next_hop_ip: *arp_ip,
                        },
                        action: StepAction::Forwarded,
                    });
                    self.forward_out_interface(branch, interface, arp_ip.unwrap_or(dst_ip));
                }
                FibAction::NextVrf { vrf } => {
                    branch.steps.push(Step::Routing {
                        vrf: branch.vrf.clone(),
                        routes,
                        forwarding: ForwardingDetail::DelegatedToNextVrf { vrf: vrf.clone() },
                        action: StepAction::ForwardedToNextVrf,
                    });
                    branch.vrf = vrf.clone();
                    if self.ctx.snapshot.vrf_accepts_ip(&branch.node, vrf, dst_ip) {
                        self.build_accept_trace(branch);
                    } else {
                        intra_hop.push(crumb.clone());
                        self.fib_lookup(branch, intra_hop);
                        intra_hop.pop();
                    }
                }
                FibAction::NullRoute => {
                    branch.steps.push(Step::Routing {
                        vrf: branch.vrf.clone(),
                        routes,
                        forwarding: ForwardingDetail::Discarded,
                        action: StepAction::NullRouted,
                    });
                    self.build_null_routed_trace(branch);
                }
            }
        }
    }

    /// Egress pipeline, ARP resolution and edge fan-out.
    fn forward_out_interface(&mut self, mut st: PathState, out_iface: &str, arp_ip: Ipv4Addr) {
        let cfg = self.ctx.snapshot.interface(&st.node, out_iface);
        if !st.session_mode {
            let pre_filter = cfg.and_then(|c| c.pre_transformation_outgoing_filter.as_deref());
            if self.apply_filter(&mut st, pre_filter, FilterKind::PreTransformationEgress)
                == LineAction::Deny
            {
                self.build_denied_trace(st, FilterKind::PreTransformationEgress);
                return;
            }
            self.apply_transformation(&mut st, cfg.and_then(|c| c.outgoing_transformation.as_ref()));
            let out_filter = cfg.and_then(|c| c.outgoing_filter.as_deref());
            if self.apply_filter(&mut st, out_filter, FilterKind::Egress) == LineAction::Deny {
                self.build_denied_trace(st, FilterKind::Egress);
                return;
            }
            if let Some(session_info) = cfg.and_then(|c| c.firewall_session.as_ref()) {
                if st.current_flow.ip_protocol.has_sessions() {
                    self.setup_session(&mut st, session_info.fib_lookup, &session_info.session_interfaces);
                }
            }
        }
        self.push_exit_step(&mut st, out_iface);

        let repliers: Vec<NodeInterface> = self
            .ctx
            .snapshot
            .interface_neighbors(&st.node, out_iface)
            .filter(|n| self.ctx.snapshot.replies_to_arp(&n.node, &n.interface, arp_ip))
            .cloned()
            .collect();
        if repliers.is_empty() {
            // No edges, or edges but nobody answers ARP: the disposition
            // policy decides.
            self.build_unmodeled_space_trace(st, out_iface, arp_ip);
            return;
        }
        st.seal(HopInfo::forwarded);
        if !self.recorder.try_record_partial_trace(&st.hops) {
            // The continuation is already in the DAG.
            return;
        }
        let out = NodeInterface::new(&st.node, out_iface);
        for neighbor in &repliers {
            self.fork_follow_edge(&st, &out, neighbor);
        }
    }

    /// Install the return session for the flow exiting a session-enabled
    /// interface: return traffic entering any of `scope_interfaces` that
    /// matches the post-NAT 5-tuple is un-NATted and sent back the way the
    /// forward flow came (or re-routed / delivered, per configuration).
    fn setup_session(
        &mut self,
        st: &mut PathState,
        fib_lookup: bool,
        scope_interfaces: &std::collections::BTreeSet<String>,
    ) {
        let action = if fib_lookup {
            SessionAction::PostNatFibLookup
        } else if let Some(ingress) = &st.ingress_interface {
            SessionAction::ForwardOutInterface {
                outgoing_interface: ingress.clone(),
                next_hop: st.last_hop.clone(),
            }
        } else {
            SessionAction::Accept
        };
        let session = FirewallSessionTraceInfo {
            hostname: st.node.clone(),
            action,
            scope: SessionScope::IncomingInterfaces(scope_interfaces.clone()),
            match_criteria: match_session_return_flow(&st.current_flow),
            transformation: return_transformation(&st.original_flow, &st.current_flow),
        };
        st.steps.push(Step::SetupSession {
            session: session.clone(),
            action: StepAction::SetupSession,
        });
        st.session = Some(session);
    }

    fn push_exit_step(&self, st: &mut PathState, out_iface: &str) {
        let transformed_flow =
            (st.current_flow != st.original_flow).then(|| st.current_flow.clone());
        st.steps.push(Step::ExitInterface {
            interface: NodeInterface::new(&st.node, out_iface),
            transformed_flow,
            action: StepAction::Transmitted,
        });
    }

    fn fork_follow_edge(&mut self, st: &PathState, out: &NodeInterface, neighbor: &NodeInterface) {
        let Some(cfg) = self.ctx.snapshot.interface(&neighbor.node, &neighbor.interface) else {
            return;
        };
        self.process_hop(PathState {
            node: neighbor.node.clone(),
            vrf: cfg.vrf.clone(),
            ingress_interface: Some(neighbor.interface.clone()),
            last_hop: Some(out.clone()),
            original_flow: st.current_flow.clone(),
            current_flow: st.current_flow.clone(),
            steps: Vec::new(),
            hops: st.hops.clone(),
            visited: st.visited.clone(),
            crumb: None,
            session: None,
            session_mode: false,
        });
    }

    /// Evaluate a filter slot, recording the step. With `ignore_filters`
    /// the ACL is not consulted and the verdict is a permit.
    fn apply_filter(
        &self,
        st: &mut PathState,
        filter: Option<&str>,
        kind: FilterKind,
    ) -> LineAction {
        let Some(name) = filter else {
            return LineAction::Permit;
        };
        let verdict = if self.ctx.ignore_filters {
            LineAction::Permit
        } else {
            self.ctx
                .snapshot
                .acl(&st.node, name)
                .map(|acl| acl.check(&st.current_flow))
                .unwrap_or(LineAction::Permit)
        };
        st.steps.push(Step::Filter {
            filter: name.to_string(),
            kind,
            action: match verdict {
                LineAction::Permit => StepAction::Permitted,
                LineAction::Deny => StepAction::Denied,
            },
        });
        verdict
    }

    fn apply_transformation(&self, st: &mut PathState, transformation: Option<&Transformation>) {
        let Some(transformation) = transformation else {
            return;
        };
        let (output, diffs) = transformation.apply(&st.current_flow);
        st.steps.push(Step::Transformation {
            diffs,
            action: StepAction::Transformed,
        });
        st.current_flow = output;
    }

    // Terminal builders. Each closes the current hop and records the full
    // path.

    fn build_accept_trace(&mut self, mut st: PathState) {
        let snapshot = self.ctx.snapshot;
        let vrf_session = snapshot
            .node(&st.node)
            .and_then(|n| n.vrfs.get(&st.vrf))
            .and_then(|v| v.firewall_session_vrf);
        // Only flows that entered via an interface set up the VRF session;
        // locally originated traffic needs no return-path state.
        if vrf_session.is_some()
            && st.ingress_interface.is_some()
            && st.current_flow.ip_protocol.has_sessions()
        {
            let session = FirewallSessionTraceInfo {
                hostname: st.node.clone(),
                action: SessionAction::PostNatFibLookup,
                scope: SessionScope::OriginatingVrf(st.vrf.clone()),
                match_criteria: match_session_return_flow(&st.current_flow),
                transformation: return_transformation(&st.original_flow, &st.current_flow),
            };
            st.steps.push(Step::SetupSession {
                session: session.clone(),
                action: StepAction::SetupSession,
            });
            st.session = Some(session);
        }
        let accepting = snapshot
            .interface_accepting_ip(&st.node, &st.vrf, st.current_flow.dst_ip)
            .or_else(|| snapshot.any_interface_in_vrf(&st.node, &st.vrf))
            .map(str::to_string);
        if let Some(interface) = accepting {
            st.steps.push(Step::Inbound {
                interface: NodeInterface::new(&st.node, interface),
                action: StepAction::Accepted,
            });
        }
        let reverse = return_flow(&st.current_flow, &st.node, Some(&st.vrf), None);
        st.seal(|hop, flow| HopInfo::success(hop, flow, Disposition::Accepted, reverse));
        self.record_terminal(&st.hops);
    }

    fn build_loop_trace(&mut self, mut st: PathState, revisited: Rc<Breadcrumb>) {
        st.steps.push(Step::Loop);
        st.seal(|hop, flow| HopInfo::loop_terminal(hop, flow, revisited));
        self.record_terminal(&st.hops);
    }

    fn build_denied_trace(&mut self, mut st: PathState, kind: FilterKind) {
        let disposition = kind.denied_disposition();
        st.seal(|hop, flow| HopInfo::failure(hop, flow, disposition));
        self.record_terminal(&st.hops);
    }

    fn build_no_route_trace(&mut self, mut st: PathState) {
        st.steps.push(Step::Routing {
            vrf: st.vrf.clone(),
            routes: Vec::new(),
            forwarding: ForwardingDetail::Discarded,
            action: StepAction::NoRoute,
        });
        st.seal(|hop, flow| HopInfo::failure(hop, flow, Disposition::NoRoute));
        self.record_terminal(&st.hops);
    }

    fn build_null_routed_trace(&mut self, mut st: PathState) {
        st.seal(|hop, flow| HopInfo::failure(hop, flow, Disposition::NullRouted));
        self.record_terminal(&st.hops);
    }

    /// The flow leaves the modeled network out of `out_iface`.
    fn build_unmodeled_space_trace(&mut self, mut st: PathState, out_iface: &str, arp_ip: Ipv4Addr) {
        let disposition =
            self.ctx
                .compute_disposition(&st.node, out_iface, st.current_flow.dst_ip);
        let interface = NodeInterface::new(&st.node, out_iface);
        if disposition.is_successful() {
            st.steps.push(Step::Delivered {
                interface,
                resolved_ip: arp_ip,
                action: match disposition {
                    Disposition::DeliveredToSubnet => StepAction::DeliveredToSubnet,
                    _ => StepAction::ExitsNetwork,
                },
            });
            let reverse = return_flow(&st.current_flow, &st.node, None, Some(out_iface));
            st.seal(|hop, flow| HopInfo::success(hop, flow, disposition, reverse));
        } else {
            st.steps.push(Step::ArpError {
                interface,
                resolved_ip: arp_ip,
                action: match disposition {
                    Disposition::NeighborUnreachable => StepAction::NeighborUnreachable,
                    _ => StepAction::InsufficientInfo,
                },
            });
            st.seal(|hop, flow| HopInfo::failure(hop, flow, disposition));
        }
        self.record_terminal(&st.hops);
    }

    fn record_terminal(&mut self, hops: &[HopInfo]) {
        self.recorder.record_trace(hops);
        self.ctx.count_trace();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::IpProtocol;
    use crate::session::SessionMatchExpr;
    use crate::snapshot::{
        Acl, Fib, FibEntry, FirewallSessionInterfaceInfo, FirewallSessionVrfInfo,
        InterfaceConfig, NetworkSnapshot, Prefix, RouteProtocol, TransformationOp,
    };
    use crate::trace::TraceAndReverseFlow;
    use crate::TracerouteEngine;
    use std::collections::BTreeSet;

    const DST: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 1);

    fn forward_entry(interface: &str, arp_ip: Option<Ipv4Addr>) -> FibEntry {
        FibEntry {
            action: FibAction::Forward {
                interface: interface.to_string(),
                arp_ip,
            },
            route: RouteInfo {
                protocol: RouteProtocol::Static,
                network: Prefix::new(Ipv4Addr::UNSPECIFIED, 0),
                next_hop_ip: arp_ip,
            },
        }
    }

    fn add_iface(
        snap: &mut NetworkSnapshot,
        node: &str,
        name: &str,
        addr: Option<Ipv4Addr>,
    ) {
        let node = snap.nodes.entry(node.into()).or_default();
        node.vrfs.entry("default".into()).or_default();
        let mut iface = InterfaceConfig::new("default");
        if let Some(addr) = addr {
            iface.addresses.push(addr);
        }
        node.interfaces.insert(name.into(), iface);
    }

    fn set_fib(snap: &mut NetworkSnapshot, node: &str, vrf: &str, fib: Fib) {
        let node = snap.nodes.entry(node.into()).or_default();
        node.vrfs.entry(vrf.into()).or_default().fib = fib;
    }

    /// r1 --(eth1 / eth0)-- r2, destination owned by r2's loopback.
    fn line_topology() -> NetworkSnapshot {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "r2", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        add_iface(&mut snap, "r2", "lo", Some(DST));
        set_fib(
            &mut snap,
            "r1",
            "default",
            Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 12, 2))),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth1"),
            NodeInterface::new("r2", "eth0"),
        );
        snap
    }

    fn originate(node: &str, dst: Ipv4Addr) -> Flow {
        Flow::builder()
            .src_ip(Ipv4Addr::new(10, 0, 1, 100))
            .dst_ip(dst)
            .src_port(40000)
            .dst_port(443)
            .ip_protocol(IpProtocol::Tcp)
            .ingress_node(node)
            .ingress_vrf("default")
            .build()
    }

    fn traces(
        snap: &NetworkSnapshot,
        flow: &Flow,
        sessions: &[FirewallSessionTraceInfo],
        ignore_filters: bool,
    ) -> Vec<TraceAndReverseFlow> {
        let engine = TracerouteEngine::new(snap.clone());
        let mut result = engine
            .compute_traces_and_reverse_flows(&[flow.clone()], sessions, ignore_filters)
            .unwrap();
        result.remove(flow).unwrap()
    }

    #[test]
    fn test_no_route() {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth0", Some(Ipv4Addr::new(10, 0, 1, 1)));
        let flow = originate("r1", DST);
        let got = traces(&snap, &flow, &[], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::NoRoute);
        assert_eq!(trace.hops.len(), 1);
        assert!(matches!(
            trace.hops[0].steps.as_slice(),
            [
                Step::Originate { .. },
                Step::Routing {
                    action: StepAction::NoRoute,
                    ..
                },
            ]
        ));
        assert_eq!(got[0].reverse_flow, None);
    }

    #[test]
    fn test_null_routed() {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth0", Some(Ipv4Addr::new(10, 0, 1, 1)));
        let mut fib = Fib::new();
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        fib.add_entry(
            prefix,
            FibEntry {
                action: FibAction::NullRoute,
                route: RouteInfo {
                    protocol: RouteProtocol::Static,
                    network: prefix,
                    next_hop_ip: None,
                },
            },
        );
        set_fib(&mut snap, "r1", "default", fib);
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].trace.disposition, Disposition::NullRouted);
    }

    #[test]
    fn test_forward_and_accept() {
        let snap = line_topology();
        let flow = originate("r1", DST);
        let got = traces(&snap, &flow, &[], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Accepted);
        assert_eq!(trace.hops.len(), 2);
        assert_eq!(trace.hops[0].node, "r1");
        assert_eq!(trace.hops[1].node, "r2");
        assert!(matches!(
            trace.hops[1].steps.as_slice(),
            [
                Step::EnterInterface { .. },
                Step::Inbound {
                    action: StepAction::Accepted,
                    ..
                },
            ]
        ));
        let reverse = got[0].reverse_flow.as_ref().unwrap();
        assert_eq!(reverse.src_ip, DST);
        assert_eq!(reverse.dst_ip, flow.src_ip);
        assert_eq!(reverse.ingress_node, "r2");
        assert_eq!(reverse.ingress_vrf.as_deref(), Some("default"));
    }

    #[test]
    fn test_forwarding_loop_yields_single_loop_trace() {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "r2", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        set_fib(
            &mut snap,
            "r1",
            "default",
            Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 12, 2))),
        );
        set_fib(
            &mut snap,
            "r2",
            "default",
            Fib::forwarding_all("eth0", Some(Ipv4Addr::new(10, 0, 12, 1))),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth1"),
            NodeInterface::new("r2", "eth0"),
        );
        let got = traces(&snap, &originate("r1", Ipv4Addr::new(10, 9, 9, 9)), &[], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Loop);
        // r1 originates, r2 forwards back, r1 detects the revisit.
        assert_eq!(trace.hops.len(), 3);
        assert_eq!(trace.hops[2].node, "r1");
        assert_eq!(trace.hops[2].steps.last(), Some(&Step::Loop));
    }

    #[test]
    fn test_next_vrf_delegation_accepts() {
        let mut snap = NetworkSnapshot::new();
        {
            let node = snap.nodes.entry("r1".into()).or_default();
            node.vrfs.entry("red".into()).or_default();
            node.vrfs.entry("blue".into()).or_default();
            let mut iface = InterfaceConfig::new("blue");
            iface.addresses.push(DST);
            node.interfaces.insert("blue0".into(), iface);
        }
        let mut red_fib = Fib::new();
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        red_fib.add_entry(
            prefix,
            FibEntry {
                action: FibAction::NextVrf { vrf: "blue".into() },
                route: RouteInfo {
                    protocol: RouteProtocol::Static,
                    network: prefix,
                    next_hop_ip: None,
                },
            },
        );
        set_fib(&mut snap, "r1", "red", red_fib);

        let mut flow = originate("r1", DST);
        flow.ingress_vrf = Some("red".into());
        let got = traces(&snap, &flow, &[], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Accepted);
        assert_eq!(trace.hops.len(), 1);
        assert!(matches!(
            trace.hops[0].steps.as_slice(),
            [
                Step::Originate { .. },
                Step::Routing {
                    action: StepAction::ForwardedToNextVrf,
                    ..
                },
                Step::Inbound { .. },
            ]
        ));
    }

    #[test]
    fn test_next_vrf_cycle_is_a_loop() {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth0", Some(Ipv4Addr::new(10, 0, 1, 1)));
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        let next = |vrf: &str| FibEntry {
            action: FibAction::NextVrf { vrf: vrf.into() },
            route: RouteInfo {
                protocol: RouteProtocol::Static,
                network: prefix,
                next_hop_ip: None,
            },
        };
        let mut default_fib = Fib::new();
        default_fib.add_entry(prefix, next("other"));
        set_fib(&mut snap, "r1", "default", default_fib);
        let mut other_fib = Fib::new();
        other_fib.add_entry(prefix, next("default"));
        set_fib(&mut snap, "r1", "other", other_fib);

        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Loop);
        assert_eq!(trace.hops.len(), 1);
        assert_eq!(trace.hops[0].steps.last(), Some(&Step::Loop));
    }

    #[test]
    fn test_ecmp_branches_in_deterministic_order() {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "r1", "eth2", Some(Ipv4Addr::new(10, 0, 13, 1)));
        add_iface(&mut snap, "r2", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        add_iface(&mut snap, "r2", "lo", Some(DST));
        add_iface(&mut snap, "r3", "eth0", Some(Ipv4Addr::new(10, 0, 13, 2)));
        add_iface(&mut snap, "r3", "lo", Some(DST));
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        let mut fib = Fib::new();
        // Insert in reverse name order; branch order still follows the
        // action ordering.
        fib.add_entry(prefix, forward_entry("eth2", Some(Ipv4Addr::new(10, 0, 13, 2))));
        fib.add_entry(prefix, forward_entry("eth1", Some(Ipv4Addr::new(10, 0, 12, 2))));
        set_fib(&mut snap, "r1", "default", fib);
        snap.add_edge(
            NodeInterface::new("r1", "eth1"),
            NodeInterface::new("r2", "eth0"),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth2"),
            NodeInterface::new("r3", "eth0"),
        );

        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].trace.hops[1].node, "r2");
        assert_eq!(got[1].trace.hops[1].node, "r3");
        assert!(got.iter().all(|t| t.trace.disposition == Disposition::Accepted));
    }

    #[test]
    fn test_arp_failure_dispositions() {
        // Edges exist, nobody replies, destination inside the connected
        // subnet: NEIGHBOR_UNREACHABLE.
        let mut snap = line_topology();
        {
            let node = snap.nodes.get_mut("r1").unwrap();
            let iface = node.interfaces.get_mut("eth1").unwrap();
            iface
                .connected_subnets
                .push(Prefix::new(Ipv4Addr::new(10, 0, 2, 0), 24));
            // Point ARP at an address nobody owns.
            node.vrfs.get_mut("default").unwrap().fib =
                Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 12, 9)));
        }
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::NeighborUnreachable);
        assert!(matches!(
            got[0].trace.hops[0].steps.last(),
            Some(Step::ArpError {
                action: StepAction::NeighborUnreachable,
                ..
            })
        ));

        // No edges, destination owned elsewhere: INSUFFICIENT_INFO.
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "far", "lo", Some(DST));
        set_fib(&mut snap, "r1", "default", Fib::forwarding_all("eth1", None));
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::InsufficientInfo);

        // No edges, destination unknown to the snapshot: EXITS_NETWORK,
        // with a reverse flow entering at the exit interface.
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        set_fib(&mut snap, "r1", "default", Fib::forwarding_all("eth1", None));
        let outside = Ipv4Addr::new(8, 8, 8, 8);
        let got = traces(&snap, &originate("r1", outside), &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::ExitsNetwork);
        let reverse = got[0].reverse_flow.as_ref().unwrap();
        assert_eq!(reverse.src_ip, outside);
        assert_eq!(reverse.ingress_interface.as_deref(), Some("eth1"));
    }

    #[test]
    fn test_ingress_filter_denies() {
        let mut snap = line_topology();
        {
            let node = snap.nodes.get_mut("r2").unwrap();
            node.acls.insert("block".into(), Acl::deny_all("block"));
            node.interfaces.get_mut("eth0").unwrap().incoming_filter = Some("block".into());
        }
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].trace.disposition, Disposition::DeniedIn);
        assert!(matches!(
            got[0].trace.hops[1].steps.last(),
            Some(Step::Filter {
                kind: FilterKind::Ingress,
                action: StepAction::Denied,
                ..
            })
        ));
    }

    #[test]
    fn test_egress_filter_denies() {
        let mut snap = line_topology();
        {
            let node = snap.nodes.get_mut("r1").unwrap();
            node.acls.insert("block".into(), Acl::deny_all("block"));
            node.interfaces.get_mut("eth1").unwrap().outgoing_filter = Some("block".into());
        }
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::DeniedOut);
        assert_eq!(got[0].trace.hops.len(), 1);
    }

    #[test]
    fn test_ignore_filters_bypasses_acls() {
        let mut snap = line_topology();
        {
            let node = snap.nodes.get_mut("r2").unwrap();
            node.acls.insert("block".into(), Acl::deny_all("block"));
            node.interfaces.get_mut("eth0").unwrap().incoming_filter = Some("block".into());
        }
        let got = traces(&snap, &originate("r1", DST), &[], true);
        assert_eq!(got[0].trace.disposition, Disposition::Accepted);
        // The filter step is still recorded, as a permit.
        assert!(got[0].trace.hops[1].steps.iter().any(|s| matches!(
            s,
            Step::Filter {
                action: StepAction::Permitted,
                ..
            }
        )));
    }

    #[test]
    fn test_nat_session_uses_post_nat_values() {
        let mut snap = line_topology();
        let nat_ip = Ipv4Addr::new(192, 0, 2, 1);
        {
            let node = snap.nodes.get_mut("r1").unwrap();
            let eth1 = node.interfaces.get_mut("eth1").unwrap();
            eth1.outgoing_transformation =
                Some(Transformation::always(vec![TransformationOp::SetSrcIp(nat_ip)]));
            eth1.firewall_session = Some(FirewallSessionInterfaceInfo {
                session_interfaces: BTreeSet::from(["eth1".to_string()]),
                incoming_acl: None,
                outgoing_acl: None,
                fib_lookup: false,
            });
        }
        let flow = originate("r1", DST);
        let got = traces(&snap, &flow, &[], false);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].trace.disposition, Disposition::Accepted);

        // Reverse flow mirrors the transformed header.
        let reverse = got[0].reverse_flow.as_ref().unwrap();
        assert_eq!(reverse.dst_ip, nat_ip);
        assert_eq!(reverse.src_ip, DST);

        // The installed session matches post-NAT return traffic and undoes
        // the NAT.
        assert_eq!(got[0].new_sessions.len(), 1);
        let session = &got[0].new_sessions[0];
        assert_eq!(session.hostname, "r1");
        assert_eq!(session.match_criteria.dst_ip, nat_ip);
        assert_eq!(session.match_criteria.src_ip, DST);
        // The forward flow originated on r1, so matched return traffic is
        // delivered there.
        assert_eq!(session.action, SessionAction::Accept);
        let undo = session.transformation.as_ref().unwrap();
        let (restored, _) = undo.apply(reverse);
        assert_eq!(restored.dst_ip, flow.src_ip);

        // The exit step carries the transformed flow.
        assert!(got[0].trace.hops[0].steps.iter().any(|s| matches!(
            s,
            Step::ExitInterface {
                transformed_flow: Some(f),
                ..
            } if f.src_ip == nat_ip
        )));
    }

    #[test]
    fn test_session_forwards_return_traffic() {
        // fw's eth0 faces r1; an established session forwards matching
        // traffic entering eth1 back out eth0 to r1.
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "fw", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        add_iface(&mut snap, "fw", "eth1", Some(Ipv4Addr::new(10, 0, 13, 1)));
        add_iface(&mut snap, "r1", "eth0", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "r1", "lo", Some(Ipv4Addr::new(10, 0, 1, 100)));
        snap.add_edge(
            NodeInterface::new("fw", "eth0"),
            NodeInterface::new("r1", "eth0"),
        );

        let reply = Flow::builder()
            .src_ip(DST)
            .dst_ip(Ipv4Addr::new(10, 0, 1, 100))
            .src_port(443)
            .dst_port(40000)
            .ip_protocol(IpProtocol::Tcp)
            .ingress_node("fw")
            .ingress_interface("eth1")
            .build();
        let session = FirewallSessionTraceInfo {
            hostname: "fw".into(),
            action: SessionAction::ForwardOutInterface {
                outgoing_interface: "eth0".into(),
                next_hop: Some(NodeInterface::new("r1", "eth0")),
            },
            scope: SessionScope::IncomingInterfaces(BTreeSet::from(["eth1".to_string()])),
            match_criteria: SessionMatchExpr {
                ip_protocol: IpProtocol::Tcp,
                src_ip: DST,
                dst_ip: Ipv4Addr::new(10, 0, 1, 100),
                src_port: Some(443),
                dst_port: Some(40000),
            },
            transformation: None,
        };

        let got = traces(&snap, &reply, &[session], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Accepted);
        assert_eq!(trace.hops.len(), 2);
        assert_eq!(trace.hops[0].node, "fw");
        assert!(matches!(
            trace.hops[0].steps.as_slice(),
            [
                Step::EnterInterface { .. },
                Step::MatchSession { .. },
                Step::ExitInterface { .. },
            ]
        ));
        assert_eq!(trace.hops[1].node, "r1");
    }

    #[test]
    fn test_post_nat_fib_lookup_session() {
        // Session un-NATs the reply, then routes it normally.
        let mut snap = line_topology();
        let nat_ip = Ipv4Addr::new(192, 0, 2, 1);
        let reply = Flow::builder()
            .src_ip(DST)
            .dst_ip(nat_ip)
            .src_port(443)
            .dst_port(40000)
            .ip_protocol(IpProtocol::Tcp)
            .ingress_node("r1")
            .ingress_interface("eth1")
            .build();
        let session = FirewallSessionTraceInfo {
            hostname: "r1".into(),
            action: SessionAction::PostNatFibLookup,
            scope: SessionScope::IncomingInterfaces(BTreeSet::from(["eth1".to_string()])),
            match_criteria: SessionMatchExpr {
                ip_protocol: IpProtocol::Tcp,
                src_ip: DST,
                dst_ip: nat_ip,
                src_port: Some(443),
                dst_port: Some(40000),
            },
            // Un-NAT to an address r1's FIB forwards towards r2.
            transformation: Some(Transformation::always(vec![TransformationOp::SetDstIp(
                DST,
            )])),
        };

        let got = traces(&snap, &reply, &[session], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Accepted);
        assert_eq!(trace.hops.len(), 2);
        assert!(trace.hops[0].steps.iter().any(|s| matches!(
            s,
            Step::Transformation {
                action: StepAction::Transformed,
                ..
            }
        )));
        assert_eq!(trace.hops[1].node, "r2");
    }

    #[test]
    fn test_vrf_session_installed_on_accept() {
        let mut snap = line_topology();
        snap.nodes
            .get_mut("r2")
            .unwrap()
            .vrfs
            .get_mut("default")
            .unwrap()
            .firewall_session_vrf = Some(FirewallSessionVrfInfo);
        let flow = originate("r1", DST);
        let got = traces(&snap, &flow, &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::Accepted);
        assert_eq!(got[0].new_sessions.len(), 1);
        let session = &got[0].new_sessions[0];
        assert_eq!(session.hostname, "r2");
        assert_eq!(session.scope, SessionScope::OriginatingVrf("default".into()));
        assert_eq!(session.action, SessionAction::PostNatFibLookup);
    }

    /// r1 --(eth1 / eth0)-- fw, fw owning no route to the destination.
    fn transit_topology() -> NetworkSnapshot {
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "fw", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        set_fib(
            &mut snap,
            "r1",
            "default",
            Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 12, 2))),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth1"),
            NodeInterface::new("fw", "eth0"),
        );
        snap
    }

    #[test]
    fn test_session_matches_transit_flow_on_scoped_interface() {
        // The session-owning node is mid-path: the flow originates on r1
        // and enters fw through eth0, the session's scope interface. fw has
        // no route to the destination; only the session accepts it.
        let snap = transit_topology();
        let flow = originate("r1", DST);
        let session = FirewallSessionTraceInfo {
            hostname: "fw".into(),
            action: SessionAction::Accept,
            scope: SessionScope::IncomingInterfaces(BTreeSet::from(["eth0".to_string()])),
            match_criteria: SessionMatchExpr {
                ip_protocol: IpProtocol::Tcp,
                src_ip: flow.src_ip,
                dst_ip: DST,
                src_port: Some(40000),
                dst_port: Some(443),
            },
            transformation: None,
        };

        let got = traces(&snap, &flow, &[session], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::Accepted);
        assert_eq!(trace.hops.len(), 2);
        assert!(trace.hops[1]
            .steps
            .iter()
            .any(|s| matches!(s, Step::MatchSession { .. })));
    }

    #[test]
    fn test_vrf_session_ignores_transit_flow() {
        // An originating-VRF session covers only flows originating on its
        // node. A transit flow entering via an interface routes normally,
        // even when its first-hop ingress VRF shares the scope VRF's name.
        let snap = transit_topology();
        let flow = originate("r1", DST);
        let session = FirewallSessionTraceInfo {
            hostname: "fw".into(),
            action: SessionAction::Accept,
            scope: SessionScope::OriginatingVrf("default".into()),
            match_criteria: SessionMatchExpr {
                ip_protocol: IpProtocol::Tcp,
                src_ip: flow.src_ip,
                dst_ip: DST,
                src_port: Some(40000),
                dst_port: Some(443),
            },
            transformation: None,
        };

        let got = traces(&snap, &flow, &[session], false);
        assert_eq!(got.len(), 1);
        let trace = &got[0].trace;
        assert_eq!(trace.disposition, Disposition::NoRoute);
        assert_eq!(trace.hops.len(), 2);
        assert!(!trace.hops[1]
            .steps
            .iter()
            .any(|s| matches!(s, Step::MatchSession { .. })));
    }

    #[test]
    fn test_vrf_session_not_installed_for_local_origination() {
        // A flow that originates and is accepted on the same node needs no
        // return-path session.
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "lo", Some(DST));
        snap.nodes
            .get_mut("r1")
            .unwrap()
            .vrfs
            .get_mut("default")
            .unwrap()
            .firewall_session_vrf = Some(FirewallSessionVrfInfo);
        let got = traces(&snap, &originate("r1", DST), &[], false);
        assert_eq!(got[0].trace.disposition, Disposition::Accepted);
        assert!(got[0].new_sessions.is_empty());
    }

    #[test]
    fn test_ecmp_diamond_shares_tail_subtree() {
        // r1 fans out to r2/r3, both forward to r4. The r4 subtree is
        // recorded once and reused.
        let mut snap = NetworkSnapshot::new();
        add_iface(&mut snap, "r1", "eth1", Some(Ipv4Addr::new(10, 0, 12, 1)));
        add_iface(&mut snap, "r1", "eth2", Some(Ipv4Addr::new(10, 0, 13, 1)));
        add_iface(&mut snap, "r2", "eth0", Some(Ipv4Addr::new(10, 0, 12, 2)));
        add_iface(&mut snap, "r2", "eth1", Some(Ipv4Addr::new(10, 0, 24, 2)));
        add_iface(&mut snap, "r3", "eth0", Some(Ipv4Addr::new(10, 0, 13, 3)));
        add_iface(&mut snap, "r3", "eth1", Some(Ipv4Addr::new(10, 0, 34, 3)));
        add_iface(&mut snap, "r4", "eth0", Some(Ipv4Addr::new(10, 0, 24, 4)));
        add_iface(&mut snap, "r4", "lo", Some(DST));
        let prefix = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        let mut fib = Fib::new();
        fib.add_entry(prefix, forward_entry("eth1", Some(Ipv4Addr::new(10, 0, 12, 2))));
        fib.add_entry(prefix, forward_entry("eth2", Some(Ipv4Addr::new(10, 0, 13, 3))));
        set_fib(&mut snap, "r1", "default", fib);
        set_fib(
            &mut snap,
            "r2",
            "default",
            Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 24, 4))),
        );
        set_fib(
            &mut snap,
            "r3",
            "default",
            Fib::forwarding_all("eth1", Some(Ipv4Addr::new(10, 0, 24, 4))),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth1"),
            NodeInterface::new("r2", "eth0"),
        );
        snap.add_edge(
            NodeInterface::new("r1", "eth2"),
            NodeInterface::new("r3", "eth0"),
        );
        snap.add_edge(
            NodeInterface::new("r2", "eth1"),
            NodeInterface::new("r4", "eth0"),
        );
        snap.add_edge(
            NodeInterface::new("r3", "eth1"),
            NodeInterface::new("r4", "eth0"),
        );

        let flow = originate("r1", DST);
        let ctx = TracerouteContext::new(&snap, &[], false);
        let dag = FlowTracer::new(&ctx).trace(&flow);
        let got: Vec<_> = dag.traces().collect();
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|t| t.trace.disposition == Disposition::Accepted));
        assert_eq!(ctx.traces_recorded(), 2);
        // Both paths hand the same flow to r4's eth0, so the terminal hop
        // is stored once with two incoming edges.
        assert_eq!(dag.count_nodes(), 5);
        assert_eq!(dag.count_edges(), 4);
    }
}
