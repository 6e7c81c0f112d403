//! Tracer Module
//!
//! The per-hop simulation state machine. A `FlowTracer` explores every
//! forwarding branch of one flow depth-first, feeding hops into a
//! `DagTraceRecorder` and stopping early wherever the recorder reports the
//! continuation already explored.

mod flow_tracer;

pub use flow_tracer::FlowTracer;
