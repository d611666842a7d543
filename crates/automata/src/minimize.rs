//! Hopcroft minimization: partition-refine a DFA into a canonical
//! minimal DFA, preserving rule-tag distinctions among accept states.

use crate::dfa::{Dfa, StateId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Minimises `dfa` by partition refinement.
///
/// Step 1 splits states by `(accept?, rule-tag)` so that two states
/// belonging to different rules are never merged, even if they'd otherwise
/// be Hopcroft-equivalent. Step 2 refines the partition with a worklist of
/// `(block, minterm)` splitters, preferring to re-enqueue the smaller of the
/// two halves produced by a split (Hopcroft's "smaller half" rule); ties
/// are broken by block-id order, so output is reproducible for a fixed rule
/// ordering.
pub fn minimize<Tag: Clone + Ord>(dfa: &Dfa<Tag>) -> Dfa<Tag> {
    let reachable = dfa.reachable_states();
    let alphabet_len = dfa.minterms().len();

    // preimage[minterm][state] = states transitioning into `state` on that minterm.
    let mut preimage: Vec<BTreeMap<StateId, Vec<StateId>>> =
        vec![BTreeMap::new(); alphabet_len];
    for &state in &reachable {
        for (minterm_idx, target) in dfa.row(state).iter().enumerate() {
            if let Some(target) = target {
                preimage[minterm_idx].entry(*target).or_default().push(state);
            }
        }
    }

    let mut partition = initial_partition(dfa, &reachable);
    let mut block_of: BTreeMap<StateId, usize> = BTreeMap::new();
    for (idx, block) in partition.iter().enumerate() {
        for &state in block {
            block_of.insert(state, idx);
        }
    }

    let mut worklist: VecDeque<(usize, usize)> = VecDeque::new();
    for block_idx in 0..partition.len() {
        for minterm_idx in 0..alphabet_len {
            worklist.push_back((block_idx, minterm_idx));
        }
    }

    while let Some((splitter_block, minterm_idx)) = worklist.pop_front() {
        let preimages = &preimage[minterm_idx];
        let mut x: BTreeSet<StateId> = BTreeSet::new();
        for &state in &partition[splitter_block] {
            if let Some(sources) = preimages.get(&state) {
                x.extend(sources.iter().copied());
            }
        }
        if x.is_empty() {
            continue;
        }

        let mut touched: BTreeMap<usize, BTreeSet<StateId>> = BTreeMap::new();
        for &state in &x {
            touched.entry(block_of[&state]).or_default().insert(state);
        }

        for (block_idx, intersection) in touched {
            let block_size = partition[block_idx].len();
            if intersection.len() == block_size {
                continue; // Y is a subset of X: no split.
            }

            let remainder: BTreeSet<StateId> = partition[block_idx]
                .difference(&intersection)
                .copied()
                .collect();

            partition[block_idx] = remainder.clone();
            let new_block_idx = partition.len();
            partition.push(intersection.clone());
            for &state in &intersection {
                block_of.insert(state, new_block_idx);
            }

            let smaller_block = if intersection.len() <= remainder.len() {
                new_block_idx
            } else {
                block_idx
            };
            for a in 0..alphabet_len {
                worklist.push_back((smaller_block, a));
            }
            log::trace!(
                "hopcroft: split block {block_idx} on minterm {minterm_idx} into {} states + {} states",
                intersection.len(),
                remainder.len()
            );
        }
    }

    build_minimized(dfa, &partition, &block_of)
}

fn initial_partition<Tag: Clone + Ord>(
    dfa: &Dfa<Tag>,
    reachable: &BTreeSet<StateId>,
) -> Vec<BTreeSet<StateId>> {
    let mut groups: BTreeMap<Option<Tag>, BTreeSet<StateId>> = BTreeMap::new();
    for &state in reachable {
        let key = dfa.rule_tag(state).cloned();
        groups.entry(key).or_default().insert(state);
    }
    groups.into_values().collect()
}

fn build_minimized<Tag: Clone + Ord>(
    dfa: &Dfa<Tag>,
    partition: &[BTreeSet<StateId>],
    block_of: &BTreeMap<StateId, usize>,
) -> Dfa<Tag> {
    let alphabet_len = dfa.minterms().len();
    let mut transitions: BTreeMap<StateId, Vec<Option<StateId>>> = BTreeMap::new();
    let mut accepting: BTreeMap<StateId, Tag> = BTreeMap::new();

    for (block_idx, block) in partition.iter().enumerate() {
        let representative = *block.iter().next().expect("blocks are never empty");
        let block_id = block_idx as StateId;

        if let Some(tag) = dfa.rule_tag(representative) {
            accepting.insert(block_id, tag.clone());
        }

        let mut row = vec![None; alphabet_len];
        for (minterm_idx, target) in dfa.row(representative).iter().enumerate() {
            if let Some(target) = target {
                row[minterm_idx] = Some(block_of[target] as StateId);
            }
        }
        transitions.insert(block_id, row);
    }

    let initial_block = block_of[&dfa.initial()] as StateId;
    Dfa::from_parts(
        initial_block,
        partition.len() as StateId,
        accepting,
        dfa.minterms().to_vec(),
        transitions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::{CharRange, CharRangeSet};
    use crate::determinize::subset_construction;
    use crate::fa::{Fa, MergeOptions};

    fn star_ab() -> Dfa<&'static str> {
        // (ab)*: init=final, loops through two states.
        let mut fa: Fa<&str> = Fa::new();
        let s0 = fa.create_node();
        let s1 = fa.create_node();
        let a = CharRangeSet::from_range(CharRange::single('a' as u32));
        let b = CharRangeSet::from_range(CharRange::single('b' as u32));
        fa.add_edge(s0, s1, Some(a));
        fa.add_edge(s1, s0, Some(b));
        fa.set_initial(s0);
        fa.add_final(s0, "R");
        subset_construction(&fa)
    }

    #[test]
    fn star_ab_minimizes_to_two_states() {
        let dfa = star_ab();
        let min = minimize(&dfa);
        assert_eq!(min.state_count(), 2);
        assert!(min.accepts([]));
        assert!(min.accepts("ab".chars().map(|c| c as u32)));
        assert!(min.accepts("abab".chars().map(|c| c as u32)));
        assert!(!min.accepts("a".chars().map(|c| c as u32)));
        assert!(!min.accepts("abb".chars().map(|c| c as u32)));
    }

    #[test]
    fn idempotent_on_already_minimal_dfa() {
        let dfa = star_ab();
        let once = minimize(&dfa);
        let twice = minimize(&once);
        assert_eq!(once.state_count(), twice.state_count());
    }

    #[test]
    fn char_class_plus_minimizes_to_two_states() {
        // [a-z]+
        let mut fa: Fa<&str> = Fa::new();
        let s0 = fa.create_node();
        let s1 = fa.create_node();
        let lower = CharRangeSet::from_range(CharRange::new('a' as u32, 'z' as u32).unwrap());
        fa.add_edge(s0, s1, Some(lower.clone()));
        fa.add_edge(s1, s1, Some(lower));
        fa.set_initial(s0);
        fa.add_final(s1, "ID");

        let dfa = subset_construction(&fa);
        let min = minimize(&dfa);
        assert_eq!(min.state_count(), 2);
        assert!(min.accepts("abc".chars().map(|c| c as u32)));
        assert!(!min.accepts([]));
        assert!(!min.accepts("aB".chars().map(|c| c as u32)));
    }

    #[test]
    fn preserves_rule_tag_distinctions_among_accept_states() {
        let mut kw: Fa<&str> = Fa::new();
        let i = kw.create_node();
        let f1 = kw.create_node();
        let f2 = kw.create_node();
        kw.add_edge(i, f1, Some(CharRangeSet::from_range(CharRange::single('i' as u32))));
        kw.add_edge(f1, f2, Some(CharRangeSet::from_range(CharRange::single('f' as u32))));
        kw.set_initial(i);
        kw.add_final(f2, "KW");

        let mut id: Fa<&str> = Fa::new();
        let s = id.create_node();
        let e = id.create_node();
        let lower = CharRangeSet::from_range(CharRange::new('a' as u32, 'z' as u32).unwrap());
        id.add_edge(s, e, Some(lower.clone()));
        id.add_edge(e, e, Some(lower));
        id.set_initial(s);
        id.add_final(e, "ID");

        let mut combined: Fa<&str> = Fa::new();
        let kw_init = kw.initial().unwrap();
        let off_kw = combined.merge(kw, MergeOptions::default());
        let id_init = id.initial().unwrap();
        let off_id = combined.merge(id, MergeOptions::default());
        let init = combined.create_node();
        combined.add_epsilon(init, kw_init + off_kw);
        combined.add_epsilon(init, id_init + off_id);
        combined.set_initial(init);

        let dfa = subset_construction(&combined);
        let min = minimize(&dfa);

        let mut state = min.initial();
        for c in "if".chars() {
            state = min.step(state, c as u32).unwrap();
        }
        assert_eq!(min.rule_tag(state), Some(&"KW"));

        let mut state = min.initial();
        for c in "ifs".chars() {
            state = min.step(state, c as u32).unwrap();
        }
        assert_eq!(min.rule_tag(state), Some(&"ID"));
    }
}
