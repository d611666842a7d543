//! The automaton graph: a directed multigraph with ε or [`CharRangeSet`]
//! edge labels, a single initial node, and a set of final nodes each tagged
//! with an owning rule.
//!
//! Node identifiers are issued monotonically and re-issued on [`Fa::merge`];
//! provenance (which rule a node came from) is tracked as a structured
//! `(owner_rule, local_id)` tuple rather than by mutating a label string, so
//! it only gets rendered to text at the point a reporting sink asks for it.

use crate::charset::CharRangeSet;
use std::collections::{BTreeMap, BTreeSet};

pub type NodeId = u32;

/// Where a node came from: which rule synthesized it, and at what point in
/// that rule's own (pre-merge) numbering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Provenance {
    pub owner_rule: Option<String>,
    pub local_id: NodeId,
    pub source_line: Option<u32>,
}

impl Provenance {
    /// Renders `(owner_rule, local_id)` to the `rule_localid` textual form
    /// used for reporting; non-owned nodes render as `n<id>`.
    pub fn render(&self) -> String {
        match &self.owner_rule {
            Some(rule) => format!("{rule}_{}", self.local_id),
            None => format!("n{}", self.local_id),
        }
    }
}

/// A transition label: ε (`None`) or a non-empty [`CharRangeSet`] (`Some`).
pub type Label = Option<CharRangeSet>;

/// Options governing how [`Fa::merge`] treats the absorbed automaton's node
/// provenance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Keep the original node provenance of the absorbed automaton instead
    /// of rewriting it under a fresh prefix.
    pub preserve_labels: bool,
}

/// A directed multigraph of states connected by ε or character-range edges.
///
/// `Tag` identifies which rule owns a final (accepting) state.
#[derive(Clone, Debug)]
pub struct Fa<Tag> {
    num_nodes: NodeId,
    provenance: Vec<Provenance>,
    initial: Option<NodeId>,
    accepting: BTreeMap<NodeId, Tag>,
    transitions: BTreeMap<NodeId, BTreeMap<Label, BTreeSet<NodeId>>>,
}

impl<Tag> Default for Fa<Tag> {
    fn default() -> Self {
        Self {
            num_nodes: 0,
            provenance: Vec::new(),
            initial: None,
            accepting: BTreeMap::new(),
            transitions: BTreeMap::new(),
        }
    }
}

impl<Tag: Clone + Ord> Fa<Tag> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh node, returning its id. Ids within one `Fa` are
    /// monotonically increasing.
    pub fn create_node(&mut self) -> NodeId {
        let id = self.num_nodes;
        self.num_nodes += 1;
        self.provenance.push(Provenance {
            local_id: id,
            ..Provenance::default()
        });
        self.transitions.entry(id).or_default();
        id
    }

    pub fn num_nodes(&self) -> NodeId {
        self.num_nodes
    }

    pub fn initial(&self) -> Option<NodeId> {
        self.initial
    }

    /// Overwrites any prior initial node.
    pub fn set_initial(&mut self, id: NodeId) {
        self.initial = Some(id);
    }

    pub fn is_final(&self, id: NodeId) -> bool {
        self.accepting.contains_key(&id)
    }

    pub fn rule_tag(&self, id: NodeId) -> Option<&Tag> {
        self.accepting.get(&id)
    }

    /// Additive: marks `id` as accepting, owned by `tag`.
    pub fn add_final(&mut self, id: NodeId, tag: Tag) {
        self.accepting.insert(id, tag);
    }

    pub fn final_nodes(&self) -> impl Iterator<Item = (&NodeId, &Tag)> {
        self.accepting.iter()
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: Label) {
        self.transitions
            .entry(from)
            .or_default()
            .entry(label)
            .or_default()
            .insert(to);
    }

    pub fn add_epsilon(&mut self, from: NodeId, to: NodeId) {
        self.add_edge(from, to, None);
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = (&Label, &BTreeSet<NodeId>)> {
        self.transitions.get(&id).into_iter().flat_map(|m| m.iter())
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.num_nodes
    }

    pub fn provenance(&self, id: NodeId) -> &Provenance {
        &self.provenance[id as usize]
    }

    /// Rewrites every node's provenance to be owned by `prefix`, keeping
    /// each node's original id as its `local_id`. Used after synthesizing a
    /// whole regex rule, so later stages can recover which rule a node
    /// belongs to.
    pub fn prefix_nodes(&mut self, prefix: &str, source_line: Option<u32>) {
        for p in &mut self.provenance {
            p.owner_rule = Some(prefix.to_string());
            p.source_line = source_line;
        }
    }

    /// The alphabet: the union of all non-ε edge labels.
    pub fn alphabet(&self) -> CharRangeSet {
        let mut alphabet = CharRangeSet::new();
        for labels in self.transitions.values() {
            for label in labels.keys().flatten() {
                alphabet = alphabet.union(label);
            }
        }
        alphabet
    }

    /// Every distinct non-ε edge label in the automaton (not yet unioned
    /// into a single alphabet) — the input to minterm computation.
    pub fn edge_labels(&self) -> Vec<CharRangeSet> {
        let mut labels = BTreeSet::new();
        for row in self.transitions.values() {
            for label in row.keys().flatten() {
                labels.insert(label.ranges().collect::<Vec<_>>());
            }
        }
        labels
            .into_iter()
            .map(crate::charset::CharRangeSet::from_ranges)
            .collect()
    }

    /// Absorbs `other`, re-issuing its node ids starting at
    /// `self.num_nodes()`. Returns the offset applied, so a caller that
    /// remembered ids from `other` (e.g. its initial/final node) can
    /// translate them: `new_id = old_id + offset`.
    ///
    /// `other` must be treated as consumed after this call.
    pub fn merge(&mut self, other: Fa<Tag>, options: MergeOptions) -> NodeId {
        let offset = self.num_nodes;
        self.num_nodes += other.num_nodes;

        for mut p in other.provenance {
            if !options.preserve_labels {
                p.owner_rule = None;
            }
            self.provenance.push(p);
        }

        for (id, tag) in other.accepting {
            self.accepting.insert(id + offset, tag);
        }

        for (from, row) in other.transitions {
            let dest_row = self.transitions.entry(from + offset).or_default();
            for (label, targets) in row {
                let dest_targets = dest_row.entry(label).or_default();
                dest_targets.extend(targets.into_iter().map(|t| t + offset));
            }
        }

        offset
    }

    /// The least fixed point containing `seeds` and closed under ε-edges.
    pub fn epsilon_closure(&self, seeds: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        let mut closure = seeds.clone();
        let mut stack: Vec<NodeId> = seeds.iter().copied().collect();
        while let Some(id) = stack.pop() {
            for (label, targets) in self.outgoing(id) {
                if label.is_none() {
                    for &t in targets {
                        if closure.insert(t) {
                            stack.push(t);
                        }
                    }
                }
            }
        }
        closure
    }

    /// `true` iff this automaton has no path from its initial node to any
    /// final node (an `EmptyLanguage` condition).
    pub fn recognizes_nothing(&self) -> bool {
        let Some(initial) = self.initial else {
            return true;
        };
        let mut stack = vec![initial];
        let mut visited = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if self.is_final(id) {
                return false;
            }
            for (label, targets) in self.outgoing(id) {
                // An edge labeled with an empty `CharRangeSet` can never be
                // taken by any input, so it doesn't contribute reachability
                // (this is how an empty character class surfaces as
                // `EmptyLanguage` rather than as a false positive).
                if matches!(label, Some(set) if set.is_empty()) {
                    continue;
                }
                stack.extend(targets.iter().copied());
            }
        }
        true
    }

    /// `true` iff the empty string is in this automaton's language: some
    /// node in the initial node's ε-closure is final.
    pub fn recognizes_empty(&self) -> bool {
        let Some(initial) = self.initial else {
            return false;
        };
        self.epsilon_closure(&BTreeSet::from([initial]))
            .iter()
            .any(|&id| self.is_final(id))
    }

    /// `true` iff this automaton recognizes exactly one string.
    pub fn is_singleton(&self) -> bool {
        self.to_singleton().is_some()
    }

    /// The one code-point sequence this automaton recognizes, if it
    /// recognizes exactly one string, `None` otherwise (no strings, or more
    /// than one).
    ///
    /// Walks a single deterministic chain of singleton-range edges from the
    /// initial node, ε-closing at each step — our Thompson `concat` always
    /// welds fragments through an ε-edge, so even a plain literal like `"ab"`
    /// has one between its two character edges.
    pub fn to_singleton(&self) -> Option<Vec<u32>> {
        let initial = self.initial?;
        let mut current = self.epsilon_closure(&BTreeSet::from([initial]));
        let mut result = Vec::new();

        loop {
            if current.len() > 1 {
                return None;
            }
            let q = *current.iter().next()?;

            let mut non_epsilon: Vec<_> = self.outgoing(q).filter(|(label, _)| label.is_some()).collect();
            if non_epsilon.is_empty() {
                return self.is_final(q).then_some(result);
            }
            if non_epsilon.len() > 1 {
                return None;
            }

            let (label, targets) = non_epsilon.remove(0);
            if targets.len() != 1 {
                return None;
            }
            let set = label.as_ref().expect("filtered to non-epsilon above");
            let mut ranges = set.ranges();
            let range = ranges.next()?;
            if ranges.next().is_some() || range.min() != range.max() {
                return None;
            }

            result.push(range.min());
            let next = *targets.iter().next().unwrap();
            current = self.epsilon_closure(&BTreeSet::from([next]));
        }
    }
}
