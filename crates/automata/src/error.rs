//! Fatal, bug-indicating errors: violations of an automaton's structural
//! invariants.

use crate::fa::NodeId;

/// An automaton failed to uphold one of its structural invariants. Unlike
/// [`crate::charset::MalformedRange`] or the synthesis-time errors in
/// `lexforge-syntax`, this always indicates a bug in the pipeline itself,
/// never bad user input.
#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    #[error("automaton has no initial node")]
    NoInitialNode,

    #[error("node {node} has an incoming edge into what should be the initial node")]
    IncomingEdgeToInitial { node: NodeId },

    #[error("final node {node} has an outgoing edge, violating single-exit form")]
    OutgoingEdgeFromFinal { node: NodeId },

    #[error("dfa state {state} has more than one outgoing edge for minterm {minterm_index}")]
    NonDeterministicTransition { state: u32, minterm_index: usize },
}
