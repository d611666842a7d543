//! AST types for a lexer rule set and the Thompson-construction synthesizer
//! ([`thompson`]) that lowers them to `lexforge-automata` NFAs.

pub mod ast;
pub mod error;
pub mod thompson;

pub use ast::{
    CharClassItem, ClosureKind, ClosureRange, LexerDescription, Range, Regexp, RegexpAlternation,
    RegexpClosure, RegexpConcatenation, RegexpStatement, RegexpbasicChar, RegexpbasicParen,
    RegexpbasicSet,
};
pub use error::CompileError;
pub use thompson::{collect_positive_alphabet, description_uses_negation, synthesize_rule, StageObserver};
