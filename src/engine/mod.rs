//! Engine Module
//!
//! Batch orchestration: input validation, per-batch session indexing, and
//! rayon fan-out across independent flows. Each flow is simulated by its
//! own `FlowTracer` against the shared read-only `TracerouteContext`.

mod context;

pub use context::TracerouteContext;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::flow::Flow;
use crate::session::FirewallSessionTraceInfo;
use crate::snapshot::NetworkSnapshot;
use crate::trace::{Trace, TraceAndReverseFlow};
use crate::tracer::FlowTracer;

/// Caller errors detected before any simulation starts. Forwarding outcomes
/// are never errors; they are `Disposition` values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TracerouteError {
    #[error("unknown ingress node {0}")]
    UnknownIngressNode(String),
    #[error("unknown ingress interface {interface} on node {node}")]
    UnknownIngressInterface { node: String, interface: String },
    #[error("unknown ingress VRF {vrf} on node {node}")]
    UnknownIngressVrf { node: String, vrf: String },
    #[error("flow must set exactly one of ingress VRF and ingress interface")]
    AmbiguousIngress,
}

/// Deterministic traceroute simulation over a network snapshot.
pub struct TracerouteEngine {
    snapshot: NetworkSnapshot,
}

impl TracerouteEngine {
    pub fn new(snapshot: NetworkSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &NetworkSnapshot {
        &self.snapshot
    }

    /// Simulate a batch of flows, returning all traces per input flow.
    pub fn compute_traces(
        &self,
        flows: &[Flow],
        ignore_filters: bool,
    ) -> Result<FxHashMap<Flow, Vec<Trace>>, TracerouteError> {
        Ok(self
            .compute_traces_and_reverse_flows(flows, &[], ignore_filters)?
            .into_iter()
            .map(|(flow, traces)| (flow, traces.into_iter().map(|t| t.trace).collect()))
            .collect())
    }

    /// Simulate a batch of flows against a set of established firewall
    /// sessions, returning traces with reverse flows and newly installed
    /// sessions.
    pub fn compute_traces_and_reverse_flows(
        &self,
        flows: &[Flow],
        sessions: &[FirewallSessionTraceInfo],
        ignore_filters: bool,
    ) -> Result<FxHashMap<Flow, Vec<TraceAndReverseFlow>>, TracerouteError> {
        // The whole batch aborts on the first invalid flow.
        for flow in flows {
            self.validate(flow)?;
        }
        let ctx = TracerouteContext::new(&self.snapshot, sessions, ignore_filters);
        Ok(flows
            .par_iter()
            .map(|flow| {
                let dag = FlowTracer::new(&ctx).trace(flow);
                (flow.clone(), dag.traces().collect())
            })
            .collect())
    }

    fn validate(&self, flow: &Flow) -> Result<(), TracerouteError> {
        let node = self
            .snapshot
            .node(&flow.ingress_node)
            .ok_or_else(|| TracerouteError::UnknownIngressNode(flow.ingress_node.clone()))?;
        match (&flow.ingress_vrf, &flow.ingress_interface) {
            (Some(vrf), None) => {
                if !node.vrfs.contains_key(vrf) {
                    return Err(TracerouteError::UnknownIngressVrf {
                        node: flow.ingress_node.clone(),
                        vrf: vrf.clone(),
                    });
                }
            }
            (None, Some(interface)) => {
                if !node.interfaces.contains_key(interface) {
                    return Err(TracerouteError::UnknownIngressInterface {
                        node: flow.ingress_node.clone(),
                        interface: interface.clone(),
                    });
                }
            }
            _ => return Err(TracerouteError::AmbiguousIngress),
        }
        Ok(())
    }
}
