//! Finite automata primitives for `lexforge`.
//!
//! This crate provides the shared automaton abstraction used by every stage
//! of the pipeline: a character-range alphabet ([`charset`]), a directed
//! multigraph with ε or range-labeled edges ([`fa`]), subset construction
//! ([`determinize`]), deterministic automata ([`dfa`]), and Hopcroft
//! minimization ([`minimize`]).

pub mod charset;
pub mod determinize;
pub mod dfa;
pub mod error;
pub mod fa;
pub mod minimize;

pub use charset::{CharRange, CharRangeSet, MalformedRange};
pub use dfa::Dfa;
pub use error::AutomatonError;
pub use fa::{Fa, MergeOptions, NodeId, Provenance};

pub use determinize::subset_construction;
pub use minimize::minimize;
