//! Incremental trace DAG construction

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::rc::Rc;

use crate::flow::Flow;
use crate::session::FirewallSessionTraceInfo;
use crate::trace::{Disposition, Hop, Trace, TraceAndReverseFlow};

use super::types::{Breadcrumb, HopInfo, NodeKey, TerminalInfo};

type NodeId = usize;

struct DagNode {
    key: NodeKey,
    breadcrumb: Option<Rc<Breadcrumb>>,
    session: Option<FirewallSessionTraceInfo>,
    terminal: Option<TerminalInfo>,
    /// Child nodes in first-recorded order. Empty for terminals.
    children: Vec<NodeId>,
    /// Breadcrumbs pushed anywhere strictly below this node. A prefix
    /// already carrying one of these would loop inside the subtree instead
    /// of following it.
    forbidden: FxHashSet<Rc<Breadcrumb>>,
    /// Breadcrumbs the subtree's loop terminals revisit that no node of the
    /// subtree pushes itself. A reusing prefix must carry all of them.
    required: FxHashSet<Rc<Breadcrumb>>,
}

/// Builds the trace DAG of a single flow, one root-to-tail path at a time.
///
/// Nodes are indexed by `NodeKey` (flow at hop entry + hop content).
/// Because the simulation is deterministic, a recorded path whose tail
/// matches an existing compatible node can adopt that node's entire
/// subtree; `record` then returns `false`, telling the caller to stop
/// exploring past the tail.
///
/// Soundness of reuse rests on depth-first exploration: a node's subtree is
/// complete, and its constraint sets final, by the time any later path can
/// match it.
#[derive(Default)]
pub struct DagTraceRecorder {
    nodes: Vec<DagNode>,
    roots: Vec<NodeId>,
    node_index: FxHashMap<NodeKey, SmallVec<[NodeId; 2]>>,
}

impl DagTraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a partial path ending on a forwarded hop, called before
    /// fanning out to neighbors. Returns whether the tail node was newly
    /// created; on `false` the tail's continuation is already in the DAG
    /// and the caller must not explore past it.
    pub fn try_record_partial_trace(&mut self, hops: &[HopInfo]) -> bool {
        debug_assert!(hops.last().is_some_and(|h| h.terminal.is_none()));
        self.record_chain(hops)
    }

    /// Record a complete path ending on a terminal hop.
    pub fn record_trace(&mut self, hops: &[HopInfo]) {
        debug_assert!(hops.last().is_some_and(|h| h.terminal.is_some()));
        self.record_chain(hops);
    }

    fn record_chain(&mut self, hops: &[HopInfo]) -> bool {
        debug_assert!(!hops.is_empty());
        let mut acc: FxHashSet<Rc<Breadcrumb>> = FxHashSet::default();
        let mut chain: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut parent: Option<NodeId> = None;
        let mut tail_created = false;
        for info in hops {
            let key = info.key();
            let existing = self
                .node_index
                .get(&key)
                .into_iter()
                .flatten()
                .copied()
                .find(|&id| self.compatible(id, &acc, &info.terminal));
            let (id, created) = match existing {
                Some(id) => (id, false),
                None => (self.push_node(info, key), true),
            };
            match parent {
                Some(p) => {
                    if !self.nodes[p].children.contains(&id) {
                        self.nodes[p].children.push(id);
                    }
                }
                None => {
                    if !self.roots.contains(&id) {
                        self.roots.push(id);
                    }
                }
            }
            if let Some(crumb) = &self.nodes[id].breadcrumb {
                acc.insert(crumb.clone());
            }
            chain.push(id);
            parent = Some(id);
            tail_created = created;
        }
        self.propagate_constraints(&chain);
        tail_created
    }

    /// Consume the recorder into the finished DAG.
    pub fn build(self) -> TraceDag {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| TraceDagNode {
                hop: n.key.hop,
                session: n.session,
                disposition: n.terminal.as_ref().map(|t| t.disposition),
                return_flow: n.terminal.and_then(|t| t.return_flow),
                children: n.children,
            })
            .collect();
        TraceDag {
            nodes,
            roots: self.roots,
        }
    }

    /// Whether `id` can stand in for a hop reached under the prefix
    /// breadcrumbs `acc`.
    fn compatible(
        &self,
        id: NodeId,
        acc: &FxHashSet<Rc<Breadcrumb>>,
        terminal: &Option<TerminalInfo>,
    ) -> bool {
        let node = &self.nodes[id];
        // Simulation is deterministic: two terminal hops with the same key
        // must agree on the outcome.
        if let (Some(recorded), Some(incoming)) = (&node.terminal, terminal) {
            assert_eq!(
                recorded.disposition, incoming.disposition,
                "terminal disposition mismatch for identical hop"
            );
        }
        if node.terminal != *terminal {
            return false;
        }
        // The prefix must not already carry the node's own state, nor any
        // state pushed inside its subtree, and must carry every state its
        // loop terminals revisit.
        if node.breadcrumb.as_ref().is_some_and(|c| acc.contains(c)) {
            return false;
        }
        node.required.iter().all(|c| acc.contains(c))
            && !node.forbidden.iter().any(|c| acc.contains(c))
    }

    fn push_node(&mut self, info: &HopInfo, key: NodeKey) -> NodeId {
        let id = self.nodes.len();
        self.node_index.entry(key.clone()).or_default().push(id);
        self.nodes.push(DagNode {
            key,
            breadcrumb: info.breadcrumb.clone(),
            session: info.session.clone(),
            terminal: info.terminal.clone(),
            children: Vec::new(),
            forbidden: FxHashSet::default(),
            required: FxHashSet::default(),
        });
        id
    }

    /// Bottom-up sweep along the just-recorded chain. Reused tails
    /// contribute their whole subtree's constraints to their new ancestors.
    fn propagate_constraints(&mut self, chain: &[NodeId]) {
        let mut need: FxHashSet<Rc<Breadcrumb>> = FxHashSet::default();
        let mut below: FxHashSet<Rc<Breadcrumb>> = FxHashSet::default();
        for &id in chain.iter().rev() {
            let node = &mut self.nodes[id];
            node.forbidden.extend(below.iter().cloned());
            below = node.forbidden.clone();
            if let Some(crumb) = &node.breadcrumb {
                below.insert(crumb.clone());
            }
            if let Some(crumb) = node
                .terminal
                .as_ref()
                .and_then(|t| t.loop_breadcrumb.as_ref())
            {
                need.insert(crumb.clone());
            }
            need.extend(node.required.iter().cloned());
            // Demands for this node's own state are satisfied here.
            if let Some(crumb) = &node.breadcrumb {
                need.remove(crumb);
            }
            node.required = need.clone();
        }
    }
}

struct TraceDagNode {
    hop: Hop,
    session: Option<FirewallSessionTraceInfo>,
    disposition: Option<Disposition>,
    return_flow: Option<Flow>,
    children: Vec<NodeId>,
}

/// The complete trace DAG of one flow. Traces are enumerated lazily in
/// depth-first pre-order, so the (possibly combinatorial) trace set is
/// never materialized unless the caller collects it.
pub struct TraceDag {
    nodes: Vec<TraceDagNode>,
    roots: Vec<NodeId>,
}

impl TraceDag {
    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of parent-child links. Root attachments are not edges.
    pub fn count_edges(&self) -> usize {
        self.nodes.iter().map(|n| n.children.len()).sum()
    }

    pub fn traces(&self) -> Traces<'_> {
        Traces {
            dag: self,
            stack: Vec::new(),
            next_root: 0,
        }
    }
}

struct Frame {
    node: NodeId,
    next_child: usize,
}

/// Lazy depth-first enumeration of a DAG's full traces.
pub struct Traces<'a> {
    dag: &'a TraceDag,
    stack: Vec<Frame>,
    next_root: usize,
}

impl Traces<'_> {
    fn emit(&self, disposition: Disposition, return_flow: Option<Flow>) -> TraceAndReverseFlow {
        let mut hops = Vec::with_capacity(self.stack.len());
        let mut new_sessions = Vec::new();
        for frame in &self.stack {
            let node = &self.dag.nodes[frame.node];
            hops.push(node.hop.clone());
            if let Some(session) = &node.session {
                new_sessions.push(session.clone());
            }
        }
        TraceAndReverseFlow {
            trace: Trace::new(disposition, hops),
            reverse_flow: return_flow,
            new_sessions,
        }
    }
}

impl Iterator for Traces<'_> {
    type Item = TraceAndReverseFlow;

    fn next(&mut self) -> Option<TraceAndReverseFlow> {
        loop {
            let pushed = match self.stack.last_mut() {
                None => {
                    let root = *self.dag.roots.get(self.next_root)?;
                    self.next_root += 1;
                    self.stack.push(Frame {
                        node: root,
                        next_child: 0,
                    });
                    root
                }
                Some(frame) => {
                    let children = &self.dag.nodes[frame.node].children;
                    if frame.next_child < children.len() {
                        let child = children[frame.next_child];
                        frame.next_child += 1;
                        self.stack.push(Frame {
                            node: child,
                            next_child: 0,
                        });
                        child
                    } else {
                        self.stack.pop();
                        continue;
                    }
                }
            };
            let node = &self.dag.nodes[pushed];
            if let Some(disposition) = node.disposition {
                let item = self.emit(disposition, node.return_flow.clone());
                self.stack.pop();
                return Some(item);
            }
        }
    }
}
