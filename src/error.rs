//! Parse errors for TSQL.
//!
//! A single error type covers all three failure classes: lexical errors
//! (converted from the scanner's error tokens), syntactic "found X, expected
//! Y" errors, and shallow semantic errors with a crafted message. Positions
//! are zero-based internally and rendered one-based.

use std::fmt;

use crate::token::Pos;

/// An error that occurred during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// A crafted message for semantic errors; when set, `found`/`expected`
    /// are unused.
    pub message: Option<String>,
    /// The offending token text.
    pub found: String,
    /// All tokens the grammar would have accepted at this position.
    pub expected: Vec<String>,
    /// Position of the offending token, when known.
    pub pos: Option<Pos>,
}

impl ParseError {
    /// A syntactic error listing the acceptable alternatives.
    pub(crate) fn expected(found: impl Into<String>, expected: &[&str], pos: Pos) -> ParseError {
        ParseError {
            message: None,
            found: found.into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            pos: Some(pos),
        }
    }

    /// A semantic error with no usable position.
    pub(crate) fn message(msg: impl Into<String>) -> ParseError {
        ParseError {
            message: Some(msg.into()),
            found: String::new(),
            expected: Vec::new(),
            pos: None,
        }
    }

    /// A semantic error anchored at a token position.
    pub(crate) fn message_at(msg: impl Into<String>, pos: Pos) -> ParseError {
        ParseError {
            message: Some(msg.into()),
            found: String::new(),
            expected: Vec::new(),
            pos: Some(pos),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}", message)?,
            None => write!(
                f,
                "found {}, expected {}",
                self.found,
                self.expected.join(", ")
            )?,
        }
        if let Some(pos) = self.pos {
            write!(f, " at line {}, char {}", pos.line + 1, pos.char + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_found_expected() {
        let err = ParseError::expected("fill", &["FROM"], Pos { line: 0, char: 16 });
        assert_eq!(
            err.to_string(),
            "found fill, expected FROM at line 1, char 17"
        );
    }

    #[test]
    fn test_display_message() {
        let err = ParseError::message("only ORDER BY time supported at this time");
        assert_eq!(err.to_string(), "only ORDER BY time supported at this time");

        let err = ParseError::message_at("LIMIT must be >= 0", Pos { line: 2, char: 4 });
        assert_eq!(err.to_string(), "LIMIT must be >= 0 at line 3, char 5");
    }
}
