//! Thompson construction: lowers one rule's [`Regexp`] AST into an
//! ε-NFA fragment, then the whole-rule entry point stamps rule provenance
//! and hands back a tagged [`Fa`].
//!
//! Each private helper below is a *template*: it
//! produces a fresh [`Fragment`] with exactly one entry and one exit node,
//! built only by welding its children's fragments with ε-edges, never by
//! reaching into their interior. This mirrors the teacher's `BuildNFA::build_nfa_from`,
//! generalized from a single shared `StateBuilder` to each template owning
//! its own node ids and merging children in via [`Fa::merge`].

use crate::ast::{
    CharClassItem, ClosureKind, ClosureRange, LexerDescription, Regexp, RegexpStatement,
};
use crate::error::CompileError;
use lexforge_automata::{CharRange, CharRangeSet, Fa, MergeOptions, NodeId};

/// A single-entry, single-exit automaton fragment under construction. No
/// node in `fa` is marked final and `fa` has no initial node set yet — both
/// are established only once, by [`synthesize_rule`], after the whole tree
/// has been lowered.
struct Fragment<Tag> {
    fa: Fa<Tag>,
    init: NodeId,
    exit: NodeId,
}

/// Invoked after each template application, using the sink stage tags
/// (`basic_char`, `basic_set`, `range`, `concat`, `alt`, `closure`).
/// The driver crate supplies the closure; this crate has no sink type of
/// its own.
pub type StageObserver<'a, Tag> = dyn FnMut(&'static str, &Fa<Tag>) + 'a;

fn observe<Tag>(on_stage: &mut Option<&mut StageObserver<'_, Tag>>, tag: &'static str, fragment: &Fragment<Tag>) {
    if let Some(observer) = on_stage {
        observer(tag, &fragment.fa);
    }
}

fn epsilon_fragment<Tag: Clone + Ord>() -> Fragment<Tag> {
    let mut fa = Fa::new();
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_epsilon(init, exit);
    Fragment { fa, init, exit }
}

fn single_edge<Tag: Clone + Ord>(label: CharRangeSet) -> Fragment<Tag> {
    let mut fa = Fa::new();
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_edge(init, exit, Some(label));
    Fragment { fa, init, exit }
}

/// **Concat**: weld `a.exit` to `b.init` with ε, inherit `a.init`/`b.exit`.
fn concat<Tag: Clone + Ord>(a: Fragment<Tag>, b: Fragment<Tag>) -> Fragment<Tag> {
    let mut fa = a.fa;
    let offset = fa.merge(b.fa, MergeOptions::default());
    fa.add_epsilon(a.exit, b.init + offset);
    Fragment {
        fa,
        init: a.init,
        exit: b.exit + offset,
    }
}

/// **Alt**: fresh init/final, ε-fan-out into both branches, ε-fan-in
/// from both branches.
fn alt<Tag: Clone + Ord>(a: Fragment<Tag>, b: Fragment<Tag>) -> Fragment<Tag> {
    let mut fa = a.fa;
    let offset = fa.merge(b.fa, MergeOptions::default());
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_epsilon(init, a.init);
    fa.add_epsilon(init, b.init + offset);
    fa.add_epsilon(a.exit, exit);
    fa.add_epsilon(b.exit + offset, exit);
    Fragment { fa, init, exit }
}

/// **Closure-none-or-more** (`*`).
fn star<Tag: Clone + Ord>(a: Fragment<Tag>) -> Fragment<Tag> {
    let mut fa = a.fa;
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_epsilon(init, a.init);
    fa.add_epsilon(init, exit);
    fa.add_epsilon(a.exit, a.init);
    fa.add_epsilon(a.exit, exit);
    Fragment { fa, init, exit }
}

/// **Closure-one-or-more** (`+`): same shape as `*` without the `init→exit`
/// shortcut.
fn plus<Tag: Clone + Ord>(a: Fragment<Tag>) -> Fragment<Tag> {
    let mut fa = a.fa;
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_epsilon(init, a.init);
    fa.add_epsilon(a.exit, a.init);
    fa.add_epsilon(a.exit, exit);
    Fragment { fa, init, exit }
}

/// **Closure-one-or-none** (`?`).
fn optional<Tag: Clone + Ord>(a: Fragment<Tag>) -> Fragment<Tag> {
    let mut fa = a.fa;
    let init = fa.create_node();
    let exit = fa.create_node();
    fa.add_epsilon(init, a.init);
    fa.add_epsilon(init, exit);
    fa.add_epsilon(a.exit, exit);
    Fragment { fa, init, exit }
}

/// Unions every bare character / range in a class into one [`CharRangeSet`],
/// erroring on a malformed `a-z` with `lower > upper`.
fn lower_class_items(
    items: &[CharClassItem],
    rule: &str,
    source_line: Option<u32>,
) -> Result<CharRangeSet, CompileError> {
    let mut positive = CharRangeSet::new();
    for item in items {
        let range = match item {
            CharClassItem::Char(c) => CharRange::single(*c),
            CharClassItem::Range(r) => r.to_char_range().map_err(|source| CompileError::MalformedRange {
                rule: rule.to_string(),
                source_line,
                source,
            })?,
        };
        positive.insert(range);
    }
    Ok(positive)
}

/// **Finite** (`{m,n}`): `m` mandatory copies, then `n - m` copies each
/// wrapped in `?`, or a trailing `*` when `n` is unbounded. `{0,0}` lowers to
/// the empty-string fragment.
fn finite<Tag: Clone + Ord>(
    body: &Regexp,
    range: ClosureRange,
    alphabet: &CharRangeSet,
    rule: &str,
    source_line: Option<u32>,
    on_stage: &mut Option<&mut StageObserver<'_, Tag>>,
) -> Result<Fragment<Tag>, CompileError> {
    let mut result: Option<Fragment<Tag>> = None;

    for _ in 0..range.lower_bound {
        let copy = build_fragment(body, alphabet, rule, source_line, on_stage)?;
        result = Some(match result {
            None => copy,
            Some(acc) => concat(acc, copy),
        });
    }

    match range.upper_bound {
        Some(upper) => {
            for _ in range.lower_bound..upper {
                let copy = build_fragment(body, alphabet, rule, source_line, on_stage)?;
                let copy = optional(copy);
                result = Some(match result {
                    None => copy,
                    Some(acc) => concat(acc, copy),
                });
            }
        }
        None => {
            let copy = build_fragment(body, alphabet, rule, source_line, on_stage)?;
            let copy = star(copy);
            result = Some(match result {
                None => copy,
                Some(acc) => concat(acc, copy),
            });
        }
    }

    Ok(result.unwrap_or_else(epsilon_fragment))
}

fn build_fragment<Tag: Clone + Ord>(
    regexp: &Regexp,
    alphabet: &CharRangeSet,
    rule: &str,
    source_line: Option<u32>,
    on_stage: &mut Option<&mut StageObserver<'_, Tag>>,
) -> Result<Fragment<Tag>, CompileError> {
    let fragment = match regexp {
        Regexp::Char(c) => {
            let f = single_edge(CharRangeSet::from_range(CharRange::single(c.literal)));
            observe(on_stage, "basic_char", &f);
            f
        }
        Regexp::Range(r) => {
            let cr = r.to_char_range().map_err(|source| CompileError::MalformedRange {
                rule: rule.to_string(),
                source_line,
                source,
            })?;
            let f = single_edge(CharRangeSet::from_range(cr));
            observe(on_stage, "range", &f);
            f
        }
        Regexp::Set(set) => {
            let positive = lower_class_items(&set.items, rule, source_line)?;
            let label = if set.negated {
                alphabet.subtract(&positive)
            } else {
                positive
            };
            let f = single_edge(label);
            observe(on_stage, "basic_set", &f);
            f
        }
        Regexp::Paren(p) => build_fragment(&p.body, alphabet, rule, source_line, on_stage)?,
        Regexp::Concatenation(c) => {
            let left = build_fragment(&c.left, alphabet, rule, source_line, on_stage)?;
            let right = build_fragment(&c.right, alphabet, rule, source_line, on_stage)?;
            log::trace!("thompson: concat in rule `{rule}`");
            let f = concat(left, right);
            observe(on_stage, "concat", &f);
            f
        }
        Regexp::Alternation(a) => {
            let left = build_fragment(&a.left, alphabet, rule, source_line, on_stage)?;
            let right = build_fragment(&a.right, alphabet, rule, source_line, on_stage)?;
            log::trace!("thompson: alt in rule `{rule}`");
            let f = alt(left, right);
            observe(on_stage, "alt", &f);
            f
        }
        Regexp::Closure(closure) => {
            let f = match closure.kind {
                ClosureKind::ZeroOrOne => {
                    let body = build_fragment(&closure.body, alphabet, rule, source_line, on_stage)?;
                    optional(body)
                }
                ClosureKind::ZeroOrMore => {
                    let body = build_fragment(&closure.body, alphabet, rule, source_line, on_stage)?;
                    star(body)
                }
                ClosureKind::OneOrMore => {
                    let body = build_fragment(&closure.body, alphabet, rule, source_line, on_stage)?;
                    plus(body)
                }
                ClosureKind::Bounded => {
                    let range = closure
                        .quantifier
                        .expect("Bounded closures always carry a quantifier");
                    finite(&closure.body, range, alphabet, rule, source_line, on_stage)?
                }
                ClosureKind::NonGreedyZeroOrMore | ClosureKind::NonGreedyOneOrMore => {
                    return Err(CompileError::UnsupportedConstruct {
                        rule: rule.to_string(),
                        source_line,
                        construct: "non-greedy closure",
                    });
                }
            };
            observe(on_stage, "closure", &f);
            f
        }
        Regexp::Assertion => {
            return Err(CompileError::UnsupportedConstruct {
                rule: rule.to_string(),
                source_line,
                construct: "lookaround assertion",
            });
        }
    };
    Ok(fragment)
}

/// Synthesizes a single rule's NFA, stamping every node's provenance with
/// the rule's name and source line and
/// marking the single exit node final under `tag`.
///
/// `alphabet` is the locally-observed alphabet the whole rule set resolves
/// negated classes against — the caller computes it
/// once via [`collect_positive_alphabet`] before synthesizing any rule.
pub fn synthesize_rule<Tag: Clone + Ord>(
    stmt: &RegexpStatement,
    alphabet: &CharRangeSet,
    tag: Tag,
    mut on_stage: Option<&mut StageObserver<'_, Tag>>,
) -> Result<Fa<Tag>, CompileError> {
    let fragment = build_fragment(&stmt.regexp, alphabet, &stmt.name, stmt.source_line, &mut on_stage)?;
    let mut fa = fragment.fa;
    fa.set_initial(fragment.init);
    fa.add_final(fragment.exit, tag);
    fa.prefix_nodes(&stmt.name, stmt.source_line);

    if fa.recognizes_nothing() {
        return Err(CompileError::EmptyLanguage {
            rule: stmt.name.clone(),
            source_line: stmt.source_line,
        });
    }

    Ok(fa)
}

/// Unions every *positive* range appearing anywhere in the rule set —
/// negated classes contribute nothing, since they are defined in terms of
/// this alphabet rather than into it. This is the "locally observed
/// alphabet".
pub fn collect_positive_alphabet(description: &LexerDescription) -> CharRangeSet {
    let mut alphabet = CharRangeSet::new();
    for stmt in &description.rules {
        accumulate_positive(&stmt.regexp, &mut alphabet);
    }
    alphabet
}

/// `true` iff any rule in the set contains a negated character class —
/// the signal the driver uses to surface an informational note that
/// negation was resolved against the locally observed alphabet rather than
/// a Unicode-wide universe.
pub fn description_uses_negation(description: &LexerDescription) -> bool {
    description.rules.iter().any(|stmt| regexp_uses_negation(&stmt.regexp))
}

fn regexp_uses_negation(regexp: &Regexp) -> bool {
    match regexp {
        Regexp::Alternation(a) => regexp_uses_negation(&a.left) || regexp_uses_negation(&a.right),
        Regexp::Concatenation(c) => regexp_uses_negation(&c.left) || regexp_uses_negation(&c.right),
        Regexp::Closure(c) => regexp_uses_negation(&c.body),
        Regexp::Paren(p) => regexp_uses_negation(&p.body),
        Regexp::Set(set) => set.negated,
        Regexp::Char(_) | Regexp::Range(_) | Regexp::Assertion => false,
    }
}

fn accumulate_positive(regexp: &Regexp, alphabet: &mut CharRangeSet) {
    match regexp {
        Regexp::Alternation(a) => {
            accumulate_positive(&a.left, alphabet);
            accumulate_positive(&a.right, alphabet);
        }
        Regexp::Concatenation(c) => {
            accumulate_positive(&c.left, alphabet);
            accumulate_positive(&c.right, alphabet);
        }
        Regexp::Closure(c) => accumulate_positive(&c.body, alphabet),
        Regexp::Paren(p) => accumulate_positive(&p.body, alphabet),
        Regexp::Char(c) => alphabet.insert(CharRange::single(c.literal)),
        Regexp::Range(r) => {
            if let Ok(cr) = r.to_char_range() {
                alphabet.insert(cr);
            }
        }
        Regexp::Set(set) if !set.negated => {
            for item in &set.items {
                let range = match item {
                    CharClassItem::Char(c) => Some(CharRange::single(*c)),
                    CharClassItem::Range(r) => r.to_char_range().ok(),
                };
                if let Some(range) = range {
                    alphabet.insert(range);
                }
            }
        }
        Regexp::Set(_) | Regexp::Assertion => {}
    }
}
