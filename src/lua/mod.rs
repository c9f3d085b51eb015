//! A reader for the serialized-table text the simulator stores missions in.
//!
//! Only the data subset is understood: nested tables, quoted and
//! bracketed keys, string/number/boolean/nil scalars, and comments. There is
//! no expression evaluation.

use thiserror::Error;

pub mod lexer;
pub mod reader;
pub mod value;

pub use reader::{Document, parse_document};
pub use value::{Key, Table, Value};

/// Maximum table nesting accepted by the reader.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("malformed number")]
    MalformedNumber,
    #[error("malformed bracketed key")]
    MalformedKey,
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("tables nested deeper than {0}")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Builds an error for the byte `offset` of `src`. Lines and columns are
    /// 1-based and columns count characters.
    pub fn at(src: &str, offset: usize, kind: ParseErrorKind) -> Self {
        let offset = offset.min(src.len());
        let before = src.get(..offset).unwrap_or(src);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column, kind }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_location() {
        let src = "a = 1\nbb = @";
        let err = ParseError::at(src, src.find('@').unwrap(), ParseErrorKind::UnexpectedCharacter('@'));
        assert_eq!((err.line, err.column), (2, 6));
        assert_eq!(err.to_string(), "unexpected character '@' at line 2, column 6");
    }
}
