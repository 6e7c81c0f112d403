//! Packet transformations (NAT/PAT)
//!
//! A transformation is an optional guard plus an ordered list of header
//! field assignments. `apply` returns the (possibly unchanged) output flow
//! together with the field diffs, which the tracer surfaces in
//! transformation steps.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::flow::{flow_diffs, Flow, FlowDiff};

use super::acl::HeaderMatch;

/// One header field assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationOp {
    SetSrcIp(Ipv4Addr),
    SetDstIp(Ipv4Addr),
    SetSrcPort(u16),
    SetDstPort(u16),
}

impl TransformationOp {
    fn apply(self, flow: &mut Flow) {
        match self {
            TransformationOp::SetSrcIp(ip) => flow.src_ip = ip,
            TransformationOp::SetDstIp(ip) => flow.dst_ip = ip,
            TransformationOp::SetSrcPort(port) => flow.src_port = port,
            TransformationOp::SetDstPort(port) => flow.dst_port = port,
        }
    }
}

/// A guarded header rewrite. A flow not matching the guard passes through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    /// `None` means apply unconditionally.
    pub guard: Option<HeaderMatch>,
    pub ops: Vec<TransformationOp>,
}

impl Transformation {
    /// Unconditional transformation.
    pub fn always(ops: Vec<TransformationOp>) -> Self {
        Self { guard: None, ops }
    }

    /// Transformation applied only to flows matching `guard`.
    pub fn when(guard: HeaderMatch, ops: Vec<TransformationOp>) -> Self {
        Self {
            guard: Some(guard),
            ops,
        }
    }

    /// Apply to a flow, returning the output flow and the field diffs.
    pub fn apply(&self, flow: &Flow) -> (Flow, Vec<FlowDiff>) {
        if let Some(guard) = &self.guard {
            if !guard.matches(flow) {
                return (flow.clone(), Vec::new());
            }
        }
        let mut output = flow.clone();
        for op in &self.ops {
            op.apply(&mut output);
        }
        let diffs = flow_diffs(flow, &output);
        (output, diffs)
    }
}
