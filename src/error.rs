use thiserror::Error;

/// Failure compiling a pattern string into an [`crate::nfa::Nfa`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("empty pattern or alternative")]
    EmptyPattern,
}

pub use crate::event::EventParseError;
