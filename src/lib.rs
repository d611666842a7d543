//! `lexforge` — the algorithmic core of a lexer generator: Thompson
//! construction, subset construction and Hopcroft minimization over a
//! character-range alphabet.
//!
//! This crate is the pipeline driver: it orchestrates [`lexforge_syntax`]'s
//! synthesizer and [`lexforge_automata`]'s subset construction and
//! minimization, in either of two modes (see [`driver`]).
//! Parsing a lexer description into the [`lexforge_syntax::ast`] types, and
//! everything downstream of the minimal DFA (a scanning runtime, GraphViz
//! rendering, a CLI), is out of scope.

pub mod driver;
pub mod output;
pub mod sink;

pub use driver::{compile, CancellationToken, Cancelled, CompileReport, PipelineError, PipelineOptions};
pub use output::{CompiledEdge, CompiledLexer, CompiledNode};
pub use sink::{CollectingSink, NullSink, Sink};
