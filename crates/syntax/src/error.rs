//! Non-fatal and fatal errors raised while lowering a rule's AST to an NFA.

/// Errors raised by [`crate::thompson`], each carrying enough context (rule
/// name, source line) for a driver to report and, for the non-fatal kinds,
/// skip the offending rule.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("rule `{rule}` (line {source_line:?}) uses an unsupported construct: {construct}")]
    UnsupportedConstruct {
        rule: String,
        source_line: Option<u32>,
        construct: &'static str,
    },

    #[error("rule `{rule}` (line {source_line:?}): {source}")]
    MalformedRange {
        rule: String,
        source_line: Option<u32>,
        #[source]
        source: lexforge_automata::MalformedRange,
    },

    /// Non-fatal: the rule compiles to an FA with no path to any final node.
    #[error("rule `{rule}` (line {source_line:?}) matches no input (empty language)")]
    EmptyLanguage {
        rule: String,
        source_line: Option<u32>,
    },

    #[error(transparent)]
    InternalInvariantViolation(#[from] lexforge_automata::AutomatonError),
}

impl CompileError {
    /// `true` for the two kinds a driver treats as non-fatal: it may
    /// report and skip the offending rule rather than aborting the whole
    /// pipeline.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CompileError::UnsupportedConstruct { .. } | CompileError::EmptyLanguage { .. }
        )
    }
}
