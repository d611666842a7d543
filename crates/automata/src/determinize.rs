//! Subset construction: ε-NFA over a disjoint-interval alphabet to DFA.
//!
//! Grounded on `iregex-automata`'s `NFA::determinize`/`determinize_transitions_for`,
//! generalized from per-range splitting to explicit [`CharRangeSet`] minterms
//! and extended to carry rule tags into the accept-state tie-break.

use crate::charset::CharRangeSet;
use crate::dfa::{Dfa, StateId};
use crate::fa::{Fa, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Runs subset construction on `nfa`, producing a DFA over the minterm
/// alphabet derived from `nfa`'s edge labels.
///
/// Acceptance and rule tag: a DFA state is
/// accepting iff its NFA-node set contains any NFA final node, and its rule
/// tag is the owning rule of the lowest-numbered such final node (rules
/// declared earlier get lower node ids after Thompson synthesis, so this
/// implements "earliest rule wins" on ties).
pub fn subset_construction<Tag: Clone + Ord>(nfa: &Fa<Tag>) -> Dfa<Tag> {
    let minterms = CharRangeSet::minterms(&nfa.edge_labels());

    let Some(nfa_initial) = nfa.initial() else {
        return Dfa::from_parts(0, 1, BTreeMap::new(), minterms, {
            let mut t = BTreeMap::new();
            t.insert(0, Vec::new());
            t
        });
    };

    let q0 = nfa.epsilon_closure(&BTreeSet::from([nfa_initial]));

    let mut states: Vec<BTreeSet<NodeId>> = vec![q0.clone()];
    let mut index: HashMap<BTreeSet<NodeId>, StateId> = HashMap::new();
    index.insert(q0, 0);

    let mut queue: VecDeque<StateId> = VecDeque::new();
    queue.push_back(0);

    let mut transitions: BTreeMap<StateId, Vec<Option<StateId>>> = BTreeMap::new();
    let mut accepting: BTreeMap<StateId, Tag> = BTreeMap::new();

    while let Some(state_id) = queue.pop_front() {
        log::trace!("subset construction: processing dfa state {state_id}");
        let current = states[state_id as usize].clone();

        if let Some((_, tag)) = lowest_numbered_final(nfa, &current) {
            accepting.insert(state_id, tag);
        }

        let mut row = vec![None; minterms.len()];
        for (minterm_idx, minterm) in minterms.iter().enumerate() {
            let representative = minterm
                .ranges()
                .next()
                .expect("a minterm is never empty")
                .min();

            let mut moved: BTreeSet<NodeId> = BTreeSet::new();
            for &node in &current {
                for (label, targets) in nfa.outgoing(node) {
                    if let Some(label) = label {
                        if label.contains(representative) {
                            moved.extend(targets.iter().copied());
                        }
                    }
                }
            }

            if moved.is_empty() {
                continue;
            }

            let closure = nfa.epsilon_closure(&moved);
            let target = *index.entry(closure.clone()).or_insert_with(|| {
                let id = states.len() as StateId;
                states.push(closure);
                queue.push_back(id);
                id
            });
            row[minterm_idx] = Some(target);
        }

        transitions.insert(state_id, row);
    }

    Dfa::from_parts(0, states.len() as StateId, accepting, minterms, transitions)
}

fn lowest_numbered_final<Tag: Clone + Ord>(
    nfa: &Fa<Tag>,
    states: &BTreeSet<NodeId>,
) -> Option<(NodeId, Tag)> {
    states
        .iter()
        .filter_map(|&n| nfa.rule_tag(n).map(|tag| (n, tag.clone())))
        .min_by_key(|(n, _)| *n)
}
