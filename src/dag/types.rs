//! Recorder input types

use std::rc::Rc;

use crate::flow::Flow;
use crate::session::FirewallSessionTraceInfo;
use crate::trace::{Disposition, Hop};

/// The forwarding state a flow is in when a FIB lookup starts. Revisiting a
/// breadcrumb already on the path is a forwarding loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breadcrumb {
    pub node: String,
    pub vrf: String,
    pub flow: Flow,
}

impl Breadcrumb {
    pub fn new(node: impl Into<String>, vrf: impl Into<String>, flow: Flow) -> Self {
        Self {
            node: node.into(),
            vrf: vrf.into(),
            flow,
        }
    }
}

/// Identity of a DAG node: the flow as it entered the hop plus the hop's
/// full step content. Simulation is deterministic, so two hops with equal
/// keys behave identically apart from loop-detection state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub flow: Flow,
    pub hop: Hop,
}

/// Terminal annotation of a path's last hop.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalInfo {
    pub disposition: Disposition,
    /// Present iff the disposition is successful.
    pub return_flow: Option<Flow>,
    /// For loop terminals, the breadcrumb the path revisited. Subtrees
    /// containing the terminal demand it from any reusing prefix.
    pub loop_breadcrumb: Option<Rc<Breadcrumb>>,
}

/// One hop of a path handed to the recorder, annotated with the breadcrumb
/// the hop pushed, the session it installed, and its terminal info if the
/// path ends here.
#[derive(Debug, Clone)]
pub struct HopInfo {
    pub hop: Hop,
    /// The flow as it entered the hop.
    pub flow: Flow,
    pub breadcrumb: Option<Rc<Breadcrumb>>,
    pub session: Option<FirewallSessionTraceInfo>,
    pub terminal: Option<TerminalInfo>,
}

impl HopInfo {
    /// A hop the flow was forwarded through.
    pub fn forwarded(hop: Hop, flow: Flow) -> Self {
        Self {
            hop,
            flow,
            breadcrumb: None,
            session: None,
            terminal: None,
        }
    }

    /// A terminal hop with an unsuccessful disposition.
    pub fn failure(hop: Hop, flow: Flow, disposition: Disposition) -> Self {
        debug_assert!(!disposition.is_successful());
        Self {
            hop,
            flow,
            breadcrumb: None,
            session: None,
            terminal: Some(TerminalInfo {
                disposition,
                return_flow: None,
                loop_breadcrumb: None,
            }),
        }
    }

    /// A terminal hop with a successful disposition and its return flow.
    pub fn success(hop: Hop, flow: Flow, disposition: Disposition, return_flow: Flow) -> Self {
        debug_assert!(disposition.is_successful());
        Self {
            hop,
            flow,
            breadcrumb: None,
            session: None,
            terminal: Some(TerminalInfo {
                disposition,
                return_flow: Some(return_flow),
                loop_breadcrumb: None,
            }),
        }
    }

    /// A loop terminal that revisited `revisited`.
    pub fn loop_terminal(hop: Hop, flow: Flow, revisited: Rc<Breadcrumb>) -> Self {
        Self {
            hop,
            flow,
            breadcrumb: None,
            session: None,
            terminal: Some(TerminalInfo {
                disposition: Disposition::Loop,
                return_flow: None,
                loop_breadcrumb: Some(revisited),
            }),
        }
    }

    /// Attach the breadcrumb this hop pushed.
    pub fn with_breadcrumb(mut self, breadcrumb: Rc<Breadcrumb>) -> Self {
        self.breadcrumb = Some(breadcrumb);
        self
    }

    /// Attach the session this hop installed.
    pub fn with_session(mut self, session: FirewallSessionTraceInfo) -> Self {
        self.session = Some(session);
        self
    }

    pub(crate) fn key(&self) -> NodeKey {
        NodeKey {
            flow: self.flow.clone(),
            hop: self.hop.clone(),
        }
    }
}
