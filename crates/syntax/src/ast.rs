//! AST node types for a lexer rule set: a sequence of named regular
//! expression rules, each with an associated action and source line.
//!
//! These mirror the producer-side tree described by the AST builder this
//! crate is downstream of; naming is free on that side, so field names here
//! favor clarity over matching any particular parser's internal types.

use lexforge_automata::CharRange;

/// A whole lexer description: an ordered sequence of rules. Order matters —
/// it is the tie-break used by subset construction when two rules can match
/// the same input (earliest declaration wins).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexerDescription {
    pub rules: Vec<RegexpStatement>,
}

/// One named rule: `name = regexp` plus the host action code to run when it
/// matches. `action_code` is opaque to this crate; it is carried through
/// purely so a later stage (out of scope here) can emit it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpStatement {
    pub name: String,
    pub regexp: Regexp,
    pub action_code: Option<String>,
    pub source_line: Option<u32>,
}

/// A regular expression, in the small grammar this core accepts: alternation,
/// concatenation, closures, grouping, character classes and literal
/// characters. Lookaround assertions are recognized but never lowered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Regexp {
    Alternation(Box<RegexpAlternation>),
    Concatenation(Box<RegexpConcatenation>),
    Closure(Box<RegexpClosure>),
    Paren(Box<RegexpbasicParen>),
    Set(RegexpbasicSet),
    Char(RegexpbasicChar),
    /// A bare range outside of a `[...]` class, e.g. `a-z` used on its own.
    Range(Range),
    /// Recognized, never compiled: `(?=...)`, `(?!...)` and similar.
    Assertion,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpAlternation {
    pub left: Regexp,
    pub right: Regexp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpConcatenation {
    pub left: Regexp,
    pub right: Regexp,
}

/// The quantifier a closure applies. The greedy forms are the only ones this
/// core lowers; the non-greedy forms are recognized so the AST can represent
/// a full grammar, but attempting to synthesize one is a hard error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClosureKind {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
    Bounded,
    /// `*?`
    NonGreedyZeroOrMore,
    /// `+?`
    NonGreedyOneOrMore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpClosure {
    pub kind: ClosureKind,
    pub body: Regexp,
    /// Present only when `kind == Bounded`.
    pub quantifier: Option<ClosureRange>,
}

/// `{m,n}`; `upper_bound: None` means unbounded (`{m,}`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosureRange {
    pub lower_bound: u32,
    pub upper_bound: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpbasicParen {
    pub body: Regexp,
}

/// A character class, e.g. `[a-zA-Z0-9]` or `[^0-9]`. Items may mix bare
/// characters and ranges; lowering unions them all into one `CharRangeSet`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpbasicSet {
    pub negated: bool,
    pub items: Vec<CharClassItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharClassItem {
    Char(u32),
    Range(Range),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegexpbasicChar {
    pub literal: u32,
}

/// `a-z`, as written in a character class: an inclusive code-point range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub lower: u32,
    pub upper: u32,
}

impl Range {
    pub fn to_char_range(self) -> Result<CharRange, lexforge_automata::MalformedRange> {
        CharRange::new(self.lower, self.upper)
    }
}
