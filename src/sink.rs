//! The reporting sink: an optional observer the driver invokes after each
//! Thompson template application and after subset construction/Hopcroft
//! minimization, when the pipeline is configured with `emit_steps`. The core
//! never does I/O itself — a sink is how a host renders, accumulates, or
//! discards what it's told.

use lexforge_automata::Fa;

/// Every stage tag a sink may see, plus `error` (sent with the partial
/// automaton when a recoverable synthesis failure skips a rule).
pub const STAGE_TAGS: &[&str] = &[
    "basic_char",
    "basic_set",
    "range",
    "concat",
    "alt",
    "closure",
    "merge",
    "subset",
    "hopcroft",
    "error",
];

/// `sink.emit(stage_tag, automaton_snapshot, owning_key)`. The snapshot is
/// only valid for the duration of the call; a sink that needs to keep it
/// must clone.
pub trait Sink<Tag> {
    fn emit(&mut self, stage_tag: &str, automaton: &Fa<Tag>, owning_key: &str);
}

/// Discards everything. The default when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<Tag> Sink<Tag> for NullSink {
    fn emit(&mut self, _stage_tag: &str, _automaton: &Fa<Tag>, _owning_key: &str) {}
}

/// Accumulates every `emit` call in order. Exists so properties about sink
/// invocation order can be exercised without a real GraphViz renderer.
#[derive(Debug, Default)]
pub struct CollectingSink<Tag> {
    snapshots: Vec<(String, Fa<Tag>, String)>,
}

impl<Tag: Clone> CollectingSink<Tag> {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[(String, Fa<Tag>, String)] {
        &self.snapshots
    }

    pub fn stage_tags(&self) -> impl Iterator<Item = &str> {
        self.snapshots.iter().map(|(tag, _, _)| tag.as_str())
    }
}

impl<Tag: Clone> Sink<Tag> for CollectingSink<Tag> {
    fn emit(&mut self, stage_tag: &str, automaton: &Fa<Tag>, owning_key: &str) {
        self.snapshots
            .push((stage_tag.to_string(), automaton.clone(), owning_key.to_string()));
    }
}
