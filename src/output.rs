//! The minimal DFA as a serializable record, independent of the internal
//! `Dfa<Tag>` representation, so the output shape is stable even if the
//! in-memory minterm-indexed table changes.

use lexforge_automata::{CharRangeSet, Dfa};

/// One node of the output record: its id, whether it's accepting, and (if
/// so) the rule tag that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledNode {
    pub id: u32,
    pub accept: bool,
    pub rule_tag: Option<String>,
}

/// One edge of the output record, labeled with the full `CharRangeSet` the
/// minterm it was built from denotes (not a minterm index, so the record is
/// self-contained and doesn't leak the internal alphabet partitioning).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledEdge {
    pub from: u32,
    pub to: u32,
    pub label: CharRangeSet,
}

/// A minimal DFA plus the bookkeeping a host needs: a single initial id and
/// the list of rule tags in declaration order (needed to map a tag back to
/// the action code the AST associated with it).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledLexer {
    pub initial: u32,
    pub nodes: Vec<CompiledNode>,
    pub edges: Vec<CompiledEdge>,
    pub rule_tags: Vec<String>,
}

/// Renders a minimal `Dfa<String>` into the output record. Rule tags are
/// strings here because a tag only needs to identify a rule by name in the
/// serialized form; the pipeline itself works with whatever `Tag` type the
/// caller chose.
pub fn render(dfa: &Dfa<String>, rule_tags_in_declaration_order: Vec<String>) -> CompiledLexer {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for state in dfa.reachable_states() {
        let rule_tag = dfa.rule_tag(state).cloned();
        nodes.push(CompiledNode {
            id: state,
            accept: dfa.is_accepting(state),
            rule_tag,
        });

        for (minterm_idx, target) in dfa.row(state).iter().enumerate() {
            if let Some(target) = target {
                edges.push(CompiledEdge {
                    from: state,
                    to: *target,
                    label: dfa.minterms()[minterm_idx].clone(),
                });
            }
        }
    }

    CompiledLexer {
        initial: dfa.initial(),
        nodes,
        edges,
        rule_tags: rule_tags_in_declaration_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexforge_automata::{subset_construction, CharRange, Fa};

    #[test]
    fn render_includes_every_reachable_node_and_edge() {
        let mut fa: Fa<String> = Fa::new();
        let s = fa.create_node();
        let e = fa.create_node();
        fa.add_edge(
            s,
            e,
            Some(CharRangeSet::from_range(CharRange::single('a' as u32))),
        );
        fa.set_initial(s);
        fa.add_final(e, "RULE".to_string());

        let dfa = subset_construction(&fa);
        let record = render(&dfa, vec!["RULE".to_string()]);

        assert_eq!(record.initial, dfa.initial());
        assert_eq!(record.nodes.len(), 2);
        assert_eq!(record.edges.len(), 1);
        assert_eq!(record.rule_tags, vec!["RULE".to_string()]);
        assert!(record.nodes.iter().any(|n| n.accept && n.rule_tag.as_deref() == Some("RULE")));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn compiled_lexer_round_trips_through_json() {
        let mut fa: Fa<String> = Fa::new();
        let s = fa.create_node();
        let e = fa.create_node();
        fa.add_edge(
            s,
            e,
            Some(CharRangeSet::from_range(CharRange::single('a' as u32))),
        );
        fa.set_initial(s);
        fa.add_final(e, "RULE".to_string());

        let dfa = subset_construction(&fa);
        let record = render(&dfa, vec!["RULE".to_string()]);

        let json = serde_json::to_string(&record).unwrap();
        let round_tripped: CompiledLexer = serde_json::from_str(&json).unwrap();
        assert_eq!(record, round_tripped);
    }
}
