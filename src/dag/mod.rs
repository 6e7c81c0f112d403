//! Dag Module
//!
//! Shared-subtree storage for the traces of one flow:
//! - Breadcrumb: the (node, VRF, flow) state used for loop detection
//! - HopInfo: one hop annotated with the state the recorder needs
//! - DagTraceRecorder: incremental DAG construction with subtree reuse
//! - TraceDag: the finished DAG, enumerating full traces lazily
//!
//! Reuse is gated by two constraint sets per node, maintained bottom-up as
//! paths are recorded: `required` (breadcrumbs a prefix must carry for the
//! subtree's loop terminals to fire) and `forbidden` (breadcrumbs pushed
//! inside the subtree, which a prefix must not already carry).

mod recorder;
mod types;

pub use recorder::{DagTraceRecorder, TraceDag, Traces};
pub use types::{Breadcrumb, HopInfo, NodeKey, TerminalInfo};
