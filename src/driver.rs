//! The pipeline driver: orchestrates Thompson synthesis, subset
//! construction and Hopcroft minimization per rule set, chooses between
//! flatten and structured mode, and renders the result into the
//! serializable output record.

use crate::output::{self, CompiledLexer};
use crate::sink::{NullSink, Sink};
use lexforge_automata::{minimize, subset_construction, Dfa, Fa, MergeOptions, NodeId};
use lexforge_syntax::{
    collect_positive_alphabet, description_uses_negation, synthesize_rule, CompileError, LexerDescription,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Renders every node's provenance and logs it at trace level, the one place
/// this driver turns the structured `(owner_rule, local_id)` tuple into text
/// — per §9's provenance redesign flag, rendering happens only here, at sink
/// time, never by mutating a label string on the automaton itself.
fn log_provenance<Tag: Clone + Ord>(stage: &'static str, key: &str, fa: &Fa<Tag>) {
    for id in fa.nodes() {
        log::trace!("{stage} [{key}]: node {id} <- {}", fa.provenance(id).render());
    }
}

/// The enum-flag configuration surface for a compile.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Invoke the sink at every intermediate stage.
    pub emit_steps: bool,
    /// Keep original node labels across `merge` instead of rewriting them.
    pub propagate_labels: bool,
    /// Ask a multi-stage sink to aggregate calls into a single artefact
    /// instead of keying them per rule.
    pub combine_graphs: bool,
    /// Select the structured pipeline instead of flatten.
    pub structured: bool,
    /// Run independent per-rule synthesis/subset-construction/minimization
    /// passes on separate threads via `std::thread::scope`. Only meaningful
    /// with `structured`; ignored otherwise.
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            emit_steps: false,
            propagate_labels: false,
            combine_graphs: false,
            structured: false,
            parallel: false,
        }
    }
}

/// Checked after each rule is visited, after each rule's DFA is built, and
/// after each Hopcroft pass. Cloning shares the same underlying flag, so a
/// host can cancel from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raised when a host cancels an in-progress compile.
#[derive(Debug, thiserror::Error)]
#[error("lexer compilation was cancelled")]
pub struct Cancelled;

/// Everything [`compile`] can fail with: a fatal [`CompileError`] (malformed
/// range or internal invariant violation) or cancellation via a
/// [`CancellationToken`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// A finished compile: the minimal DFA plus any rules that were skipped
/// because they raised a non-fatal [`CompileError`] (`UnsupportedConstruct`
/// or `EmptyLanguage`).
#[derive(Clone, Debug)]
pub struct CompileReport {
    pub lexer: CompiledLexer,
    pub skipped_rules: Vec<CompileError>,
    /// Informational notes about design decisions the driver made silently
    /// rather than as hard errors — currently just negated-class resolution
    /// against the locally observed alphabet, surfaced so a host CLI can warn
    /// the user if it wants to.
    pub notes: Vec<String>,
}

fn negation_note(description: &LexerDescription, alphabet: &lexforge_automata::CharRangeSet) -> Option<String> {
    description_uses_negation(description).then(|| {
        format!(
            "one or more rules use a negated character class (`[^...]`); it was resolved against \
             the alphabet observed elsewhere in this rule set, not a Unicode-wide universe (alphabet \
             has {} range(s))",
            alphabet.ranges().count()
        )
    })
}

/// Compiles `description` into a minimal DFA, using `sink` to report
/// intermediate stages when `options.emit_steps` is set.
///
/// Fatal errors (`MalformedRange`, `InternalInvariantViolation`) abort the
/// whole compile. `UnsupportedConstruct` and `EmptyLanguage` are recoverable:
/// the offending rule is skipped and recorded in `skipped_rules`, and the
/// sink is sent stage tag `error` with the rule's last good fragment, if any
/// was produced before the failure (there never is, since both recoverable
/// errors are detected only once a whole rule has already synthesized).
pub fn compile(
    description: &LexerDescription,
    options: &PipelineOptions,
    sink: &mut dyn Sink<String>,
    cancellation: &CancellationToken,
) -> Result<CompileReport, PipelineError> {
    if options.structured {
        compile_structured(description, options, sink, cancellation)
    } else {
        compile_flatten(description, options, sink, cancellation)
    }
}

/// Synthesizes every rule's NFA (skipping recoverable failures), returning
/// the survivors along with their declared tag, in declaration order.
fn synthesize_all(
    description: &LexerDescription,
    sink: &mut dyn Sink<String>,
    options: &PipelineOptions,
    cancellation: &CancellationToken,
) -> Result<(Vec<(String, NodeId, Fa<String>)>, Vec<CompileError>, lexforge_automata::CharRangeSet), PipelineError> {
    let alphabet = collect_positive_alphabet(description);
    let mut survivors = Vec::new();
    let mut skipped = Vec::new();

    for stmt in &description.rules {
        if cancellation.is_cancelled() {
            return Err(Cancelled.into());
        }

        let tag = stmt.name.clone();
        // `combine_graphs` keys every call under one artefact ("*") instead
        // of per rule, so a multi-stage sink can aggregate into a single
        // artefact rather than one per rule.
        let key = if options.combine_graphs {
            "*".to_string()
        } else {
            stmt.name.clone()
        };
        // Deliberately not a `move` closure: `sink` is a `&mut dyn Sink<String>`
        // reused across every loop iteration (and again below on the
        // recoverable-error path), so it must stay a reborrow scoped to this
        // iteration rather than be consumed into the closure's environment.
        let mut observer = options.emit_steps.then(|| {
            |stage: &'static str, fa: &Fa<String>| {
                log_provenance(stage, &key, fa);
                sink.emit(stage, fa, &key);
            }
        });

        let result = synthesize_rule(
            stmt,
            &alphabet,
            tag,
            observer.as_mut().map(|f| f as &mut dyn FnMut(&'static str, &Fa<String>)),
        );

        match result {
            Ok(fa) => {
                let init = fa.initial().expect("synthesize_rule always sets an initial node");
                survivors.push((stmt.name.clone(), init, fa));
            }
            Err(err) if err.is_recoverable() => {
                let key = if options.combine_graphs { "*" } else { stmt.name.as_str() };
                let empty: Fa<String> = Fa::new();
                log_provenance("error", key, &empty);
                sink.emit("error", &empty, key);
                skipped.push(err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok((survivors, skipped, alphabet))
}

/// Welds a fresh initial node into every rule's NFA via ε, preserving each
/// rule's own accept nodes and tags (no shared final — rule tags stay
/// distinct, unlike the Thompson `Alt` template's shared exit).
fn combine_rules(rules: Vec<(NodeId, Fa<String>)>, propagate_labels: bool) -> Fa<String> {
    let mut combined: Fa<String> = Fa::new();
    let init = combined.create_node();
    let options = MergeOptions {
        preserve_labels: propagate_labels,
    };
    for (rule_init, fa) in rules {
        let offset = combined.merge(fa, options);
        combined.add_epsilon(init, rule_init + offset);
    }
    combined.set_initial(init);
    combined
}

/// Re-introduces ε-edges at the entry of a minimized DFA, treating it as an
/// NFA fragment so structured mode can Alt-combine per-rule minimal DFAs.
fn dfa_to_nfa(dfa: &Dfa<String>) -> Fa<String> {
    let mut fa: Fa<String> = Fa::new();
    for _ in 0..dfa.state_count() {
        fa.create_node();
    }
    fa.set_initial(dfa.initial());
    for (state, tag) in dfa.accepting_states() {
        fa.add_final(*state, tag.clone());
    }
    for state in 0..dfa.state_count() as u32 {
        for (minterm_idx, target) in dfa.row(state).iter().enumerate() {
            if let Some(target) = target {
                fa.add_edge(state, *target, Some(dfa.minterms()[minterm_idx].clone()));
            }
        }
    }
    fa
}

fn compile_flatten(
    description: &LexerDescription,
    options: &PipelineOptions,
    sink: &mut dyn Sink<String>,
    cancellation: &CancellationToken,
) -> Result<CompileReport, PipelineError> {
    let (survivors, skipped_rules, alphabet) = synthesize_all(description, sink, options, cancellation)?;
    let rule_tags: Vec<String> = survivors.iter().map(|(name, _, _)| name.clone()).collect();
    let notes: Vec<String> = negation_note(description, &alphabet).into_iter().collect();

    let fragments: Vec<(NodeId, Fa<String>)> = survivors
        .into_iter()
        .map(|(_, init, fa)| (init, fa))
        .collect();
    let combined = combine_rules(fragments, options.propagate_labels);
    if options.emit_steps {
        log_provenance("merge", "*", &combined);
        sink.emit("merge", &combined, "*");
    }

    let dfa = subset_construction(&combined);
    if cancellation.is_cancelled() {
        return Err(Cancelled.into());
    }
    let min = minimize(&dfa);
    if options.emit_steps {
        let subset_snapshot = dfa_to_nfa(&dfa);
        log_provenance("subset", "*", &subset_snapshot);
        sink.emit("subset", &subset_snapshot, "*");
        let hopcroft_snapshot = dfa_to_nfa(&min);
        log_provenance("hopcroft", "*", &hopcroft_snapshot);
        sink.emit("hopcroft", &hopcroft_snapshot, "*");
    }

    let lexer = output::render(&min, rule_tags);
    Ok(CompileReport {
        lexer,
        skipped_rules,
        notes,
    })
}

fn compile_structured(
    description: &LexerDescription,
    options: &PipelineOptions,
    sink: &mut dyn Sink<String>,
    cancellation: &CancellationToken,
) -> Result<CompileReport, PipelineError> {
    let (survivors, skipped_rules, alphabet) = synthesize_all(description, sink, options, cancellation)?;
    let rule_tags: Vec<String> = survivors.iter().map(|(name, _, _)| name.clone()).collect();
    let notes: Vec<String> = negation_note(description, &alphabet).into_iter().collect();

    let per_rule_minimized: Vec<(String, Dfa<String>, Dfa<String>)> = if options.parallel {
        minimize_rules_in_parallel(survivors)
    } else {
        survivors
            .into_iter()
            .map(|(name, _, fa)| {
                let dfa = subset_construction(&fa);
                let min = minimize(&dfa);
                (name, dfa, min)
            })
            .collect()
    };

    if options.emit_steps {
        for (name, dfa, min) in &per_rule_minimized {
            let key = if options.combine_graphs { "*" } else { name.as_str() };
            let subset_snapshot = dfa_to_nfa(dfa);
            log_provenance("subset", key, &subset_snapshot);
            sink.emit("subset", &subset_snapshot, key);
            let hopcroft_snapshot = dfa_to_nfa(min);
            log_provenance("hopcroft", key, &hopcroft_snapshot);
            sink.emit("hopcroft", &hopcroft_snapshot, key);
        }
    }

    let fragments: Vec<(NodeId, Fa<String>)> = per_rule_minimized
        .into_iter()
        .map(|(_, _, min)| {
            let nfa = dfa_to_nfa(&min);
            let init = nfa.initial().expect("dfa_to_nfa always sets an initial node");
            (init, nfa)
        })
        .collect();

    let combined = combine_rules(fragments, options.propagate_labels);
    if options.emit_steps {
        log_provenance("merge", "*", &combined);
        sink.emit("merge", &combined, "*");
    }

    let dfa = subset_construction(&combined);
    if cancellation.is_cancelled() {
        return Err(Cancelled.into());
    }
    let min = minimize(&dfa);
    if options.emit_steps {
        let subset_snapshot = dfa_to_nfa(&dfa);
        log_provenance("subset", "*", &subset_snapshot);
        sink.emit("subset", &subset_snapshot, "*");
        let hopcroft_snapshot = dfa_to_nfa(&min);
        log_provenance("hopcroft", "*", &hopcroft_snapshot);
        sink.emit("hopcroft", &hopcroft_snapshot, "*");
    }

    let lexer = output::render(&min, rule_tags);
    Ok(CompileReport {
        lexer,
        skipped_rules,
        notes,
    })
}

/// Each rule's synthesis already touches disjoint data in structured mode,
/// so each rule's subset construction + minimization runs on its own scoped
/// thread. No new async runtime dependency — nothing else in the stack
/// pulls one in. Returns both the pre-minimization DFA and the minimized
/// one per rule, so a caller can still tell the "subset" and "hopcroft"
/// sink stages apart.
fn minimize_rules_in_parallel(
    rules: Vec<(String, NodeId, Fa<String>)>,
) -> Vec<(String, Dfa<String>, Dfa<String>)> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = rules
            .into_iter()
            .map(|(name, _, fa)| {
                scope.spawn(move || {
                    let dfa = subset_construction(&fa);
                    let min = minimize(&dfa);
                    (name, dfa, min)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rule minimization thread panicked"))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use lexforge_syntax::{ClosureKind, Regexp, RegexpStatement, RegexpbasicChar};

    fn char_rule(name: &str, c: char) -> RegexpStatement {
        RegexpStatement {
            name: name.to_string(),
            regexp: char_regexp(c),
            action_code: None,
            source_line: Some(1),
        }
    }

    fn char_regexp(c: char) -> Regexp {
        Regexp::Char(RegexpbasicChar { literal: c as u32 })
    }

    #[test]
    fn flatten_mode_preserves_rule_declaration_order() {
        // The exact earliest-rule-wins tie-break is covered at the
        // automata level (`determinize::two_rules_earliest_declaration_wins_tie`);
        // this just checks the driver carries declaration order through to
        // the output record's `rule_tags`.
        let kw = RegexpStatement {
            name: "KW".to_string(),
            regexp: Regexp::Closure(Box::new(lexforge_syntax::RegexpClosure {
                kind: ClosureKind::OneOrMore,
                body: Regexp::Char(RegexpbasicChar { literal: 'i' as u32 }),
                quantifier: None,
            })),
            action_code: None,
            source_line: Some(1),
        };
        let id = char_rule("ID", 'i');
        let description = LexerDescription {
            rules: vec![kw, id],
        };

        let options = PipelineOptions::default();
        let mut sink = NullSink;
        let report = compile(&description, &options, &mut sink, &CancellationToken::new()).unwrap();

        assert!(report.skipped_rules.is_empty());
        assert_eq!(report.lexer.rule_tags, vec!["KW".to_string(), "ID".to_string()]);
    }

    #[test]
    fn structured_mode_matches_flatten_mode_language() {
        let a = char_rule("A", 'a');
        let b = char_rule("B", 'b');
        let description = LexerDescription {
            rules: vec![a, b],
        };

        let flatten_report = compile(
            &description,
            &PipelineOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        let structured_options = PipelineOptions {
            structured: true,
            ..PipelineOptions::default()
        };
        let structured_report = compile(
            &description,
            &structured_options,
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(flatten_report.lexer.rule_tags, structured_report.lexer.rule_tags);
        assert_eq!(flatten_report.lexer.nodes.len(), structured_report.lexer.nodes.len());
    }

    #[test]
    fn emit_steps_sends_the_merge_stage_tag() {
        let a = char_rule("A", 'a');
        let description = LexerDescription { rules: vec![a] };
        let options = PipelineOptions {
            emit_steps: true,
            ..PipelineOptions::default()
        };
        let mut sink: CollectingSink<String> = CollectingSink::new();
        compile(&description, &options, &mut sink, &CancellationToken::new()).unwrap();

        assert!(sink.stage_tags().any(|t| t == "merge"));
        assert!(sink.stage_tags().any(|t| t == "basic_char"));
        assert!(sink.stage_tags().any(|t| t == "subset"));
        assert!(sink.stage_tags().any(|t| t == "hopcroft"));
    }

    #[test]
    fn structured_mode_emits_distinct_subset_and_hopcroft_snapshots() {
        // `(a|b)*abb`: the textbook example (Aho/Sethi/Ullman, subset
        // construction followed by partition refinement) whose
        // subset-construction DFA has a pair of states that only
        // minimization discovers are equivalent. If the driver ever passes
        // the same post-minimization `Dfa` to both the "subset" and
        // "hopcroft" sink stages again, this regresses to an equal count.
        let alt_ab = Regexp::Alternation(Box::new(lexforge_syntax::RegexpAlternation {
            left: char_regexp('a'),
            right: char_regexp('b'),
        }));
        let star = Regexp::Closure(Box::new(lexforge_syntax::RegexpClosure {
            kind: ClosureKind::ZeroOrMore,
            body: alt_ab,
            quantifier: None,
        }));
        let ab = Regexp::Concatenation(Box::new(lexforge_syntax::RegexpConcatenation {
            left: char_regexp('a'),
            right: char_regexp('b'),
        }));
        let abb = Regexp::Concatenation(Box::new(lexforge_syntax::RegexpConcatenation {
            left: ab,
            right: char_regexp('b'),
        }));
        let full = Regexp::Concatenation(Box::new(lexforge_syntax::RegexpConcatenation {
            left: star,
            right: abb,
        }));

        let stmt = RegexpStatement {
            name: "R".to_string(),
            regexp: full,
            action_code: None,
            source_line: Some(1),
        };
        let description = LexerDescription { rules: vec![stmt] };
        let options = PipelineOptions {
            emit_steps: true,
            structured: true,
            ..PipelineOptions::default()
        };
        let mut sink: CollectingSink<String> = CollectingSink::new();
        compile(&description, &options, &mut sink, &CancellationToken::new()).unwrap();

        let subset = sink
            .calls()
            .iter()
            .find(|(tag, _, key)| tag == "subset" && key == "R")
            .map(|(_, fa, _)| fa)
            .expect("structured mode emits a per-rule subset snapshot");
        let hopcroft = sink
            .calls()
            .iter()
            .find(|(tag, _, key)| tag == "hopcroft" && key == "R")
            .map(|(_, fa, _)| fa)
            .expect("structured mode emits a per-rule hopcroft snapshot");

        assert!(subset.num_nodes() > hopcroft.num_nodes());
    }

    #[test]
    fn unsupported_construct_is_skipped_not_fatal() {
        let bad = RegexpStatement {
            name: "BAD".to_string(),
            regexp: Regexp::Closure(Box::new(lexforge_syntax::RegexpClosure {
                kind: ClosureKind::NonGreedyOneOrMore,
                body: Regexp::Char(RegexpbasicChar { literal: 'a' as u32 }),
                quantifier: None,
            })),
            action_code: None,
            source_line: Some(3),
        };
        let good = char_rule("GOOD", 'z');
        let description = LexerDescription {
            rules: vec![bad, good],
        };

        let report = compile(
            &description,
            &PipelineOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.skipped_rules.len(), 1);
        assert_eq!(report.lexer.rule_tags, vec!["GOOD".to_string()]);
    }

    #[test]
    fn negated_class_surfaces_an_informational_note() {
        let digit = RegexpStatement {
            name: "DIGIT".to_string(),
            regexp: Regexp::Set(lexforge_syntax::RegexpbasicSet {
                negated: false,
                items: vec![lexforge_syntax::CharClassItem::Range(lexforge_syntax::Range {
                    lower: '0' as u32,
                    upper: '9' as u32,
                })],
            }),
            action_code: None,
            source_line: Some(1),
        };
        let not_digit = RegexpStatement {
            name: "NOTDIGIT".to_string(),
            regexp: Regexp::Set(lexforge_syntax::RegexpbasicSet {
                negated: true,
                items: vec![lexforge_syntax::CharClassItem::Range(lexforge_syntax::Range {
                    lower: '0' as u32,
                    upper: '9' as u32,
                })],
            }),
            action_code: None,
            source_line: Some(2),
        };
        let description = LexerDescription {
            rules: vec![digit, not_digit],
        };

        let report = compile(
            &description,
            &PipelineOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.notes.len(), 1);

        let no_negation = LexerDescription {
            rules: vec![char_rule("A", 'a')],
        };
        let plain_report = compile(
            &no_negation,
            &PipelineOptions::default(),
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(plain_report.notes.is_empty());
    }

    #[test]
    fn parallel_structured_mode_agrees_with_sequential() {
        let a = char_rule("A", 'a');
        let b = char_rule("B", 'b');
        let description = LexerDescription {
            rules: vec![a, b],
        };

        let sequential = compile(
            &description,
            &PipelineOptions {
                structured: true,
                ..PipelineOptions::default()
            },
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        let parallel = compile(
            &description,
            &PipelineOptions {
                structured: true,
                parallel: true,
                ..PipelineOptions::default()
            },
            &mut NullSink,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(sequential.lexer.nodes.len(), parallel.lexer.nodes.len());
        assert_eq!(sequential.lexer.rule_tags, parallel.lexer.rule_tags);
    }
}
