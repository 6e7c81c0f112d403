//! Trace Module
//!
//! The output vocabulary of a simulation: traces are sequences of hops, hops
//! are sequences of steps, and every trace ends in exactly one disposition.
//! All types here are value-equal and hashable so the DAG recorder can index
//! partial paths by their content.

mod types;

pub use types::{
    Disposition, FilterKind, ForwardingDetail, Hop, Step, StepAction, Trace, TraceAndReverseFlow,
};
