//! Deterministic automata: the output of subset construction and the
//! input/output of Hopcroft minimization.
//!
//! A [`Dfa`] is total only over its own minterm alphabet; any other code
//! point is an implicit reject (no sink state is materialized).

use crate::charset::CharRangeSet;
use std::collections::BTreeMap;

pub type StateId = u32;

/// A deterministic finite automaton over a minterm-partitioned alphabet.
#[derive(Clone, Debug)]
pub struct Dfa<Tag> {
    initial: StateId,
    num_states: StateId,
    accepting: BTreeMap<StateId, Tag>,
    minterms: Vec<CharRangeSet>,
    /// `transitions[state][minterm_index]`, `None` meaning implicit reject.
    transitions: BTreeMap<StateId, Vec<Option<StateId>>>,
}

impl<Tag: Clone + Ord> Dfa<Tag> {
    pub fn from_parts(
        initial: StateId,
        num_states: StateId,
        accepting: BTreeMap<StateId, Tag>,
        minterms: Vec<CharRangeSet>,
        transitions: BTreeMap<StateId, Vec<Option<StateId>>>,
    ) -> Self {
        Self {
            initial,
            num_states,
            accepting,
            minterms,
            transitions,
        }
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn state_count(&self) -> usize {
        self.num_states as usize
    }

    pub fn minterms(&self) -> &[CharRangeSet] {
        &self.minterms
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.contains_key(&state)
    }

    pub fn rule_tag(&self, state: StateId) -> Option<&Tag> {
        self.accepting.get(&state)
    }

    pub fn accepting_states(&self) -> impl Iterator<Item = (&StateId, &Tag)> {
        self.accepting.iter()
    }

    /// The outgoing transition table for `state`: one entry per minterm.
    pub fn row(&self, state: StateId) -> &[Option<StateId>] {
        self.transitions
            .get(&state)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn minterm_index_of(&self, code_point: u32) -> Option<usize> {
        self.minterms.iter().position(|m| m.contains(code_point))
    }

    pub fn step(&self, state: StateId, code_point: u32) -> Option<StateId> {
        let idx = self.minterm_index_of(code_point)?;
        self.row(state).get(idx).copied().flatten()
    }

    /// Checks whether the given sequence of code points is accepted.
    pub fn accepts(&self, input: impl IntoIterator<Item = u32>) -> bool {
        let mut state = self.initial;
        for code_point in input {
            match self.step(state, code_point) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.is_accepting(state)
    }

    /// States reachable from the initial state.
    pub fn reachable_states(&self) -> std::collections::BTreeSet<StateId> {
        let mut visited = std::collections::BTreeSet::new();
        let mut stack = vec![self.initial];
        while let Some(state) = stack.pop() {
            if visited.insert(state) {
                for target in self.row(state).iter().flatten() {
                    stack.push(*target);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::CharRange;

    fn single_char_dfa() -> Dfa<&'static str> {
        let minterms = vec![CharRangeSet::from_range(CharRange::single('a' as u32))];
        let mut transitions = BTreeMap::new();
        transitions.insert(0, vec![Some(1)]);
        transitions.insert(1, vec![None]);
        let mut accepting = BTreeMap::new();
        accepting.insert(1, "RULE");
        Dfa::from_parts(0, 2, accepting, minterms, transitions)
    }

    #[test]
    fn accepts_exactly_one_string() {
        let dfa = single_char_dfa();
        assert!(dfa.accepts(['a' as u32]));
        assert!(!dfa.accepts(['b' as u32]));
        assert!(!dfa.accepts([]));
    }

    #[test]
    fn unknown_code_point_rejects() {
        let dfa = single_char_dfa();
        assert!(!dfa.accepts(['z' as u32]));
    }
}
