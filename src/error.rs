use std::fmt::{Display, Formatter};

use crate::util::Position;

/// A grammar executed against input but failed to match.
///
/// Carries the *last known failure position* — the high-water mark of every
/// memo entry written during the attempt, mirroring the teacher's
/// `max_parsed_point` — as a diagnostic, not a guarantee that this is where
/// the "real" problem is.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub pointer: usize,
    pub position: Option<Position>,
    pub message: String,
}

impl ParseError {
    pub fn new(pointer: usize, message: String) -> Self {
        Self {
            pointer,
            position: None,
            message,
        }
    }

    pub fn with_position(pointer: usize, position: Position, message: String) -> Self {
        Self {
            pointer,
            position: Some(position),
            message,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(position) => write!(f, "SyntaxError: {} at {}", self.message, position),
            None => write!(f, "SyntaxError: {} at index {}", self.message, self.pointer),
        }
    }
}

impl std::error::Error for ParseError {}

/// A malformed grammar detected ahead of any parse attempt — an
/// `OperatorPrecedence` table with no rows, a zero-field struct descriptor,
/// a nullable lexer pattern. Analogous to the teacher's eager `validate()`
/// pass, raised from the relevant constructor instead of surfacing lazily
/// as a confusing `ParseError` mid-parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplementationError {
    pub what: String,
    pub message: String,
}

impl ImplementationError {
    pub fn new(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl Display for ImplementationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImplementationError: {} - {}", self.what, self.message)
    }
}

impl std::error::Error for ImplementationError {}
