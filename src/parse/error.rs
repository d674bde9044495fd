use std::fmt;

/// What went wrong while loading a reduction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `read` without `end`, `end` without `read`, or a block opened inside another.
    UnbalancedBlock,
    /// Table row whose cells do not match the header, or a bad cell.
    MalformedRow,
    /// Strict mode: key not covered by the schema.
    UnknownSetting,
    /// Inputs were required but the data block holds none.
    EmptyFileSpec,
    UnknownKeyword,
    MalformedSection,
    MalformedValue,
    MalformedKey,
    MalformedTable,
    MalformedSetup,
    DuplicateBlock,
    PathConflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnbalancedBlock => "unbalanced block",
            ErrorKind::MalformedRow => "malformed row",
            ErrorKind::UnknownSetting => "unknown setting",
            ErrorKind::EmptyFileSpec => "empty file spec",
            ErrorKind::UnknownKeyword => "unknown keyword",
            ErrorKind::MalformedSection => "malformed section",
            ErrorKind::MalformedValue => "malformed value",
            ErrorKind::MalformedKey => "malformed key",
            ErrorKind::MalformedTable => "malformed table",
            ErrorKind::MalformedSetup => "malformed setup",
            ErrorKind::DuplicateBlock => "duplicate block",
            ErrorKind::PathConflict => "conflicting setting path",
        };
        f.write_str(s)
    }
}

/// A fatal load error: the line, the offending token, and the construct that
/// was expected there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}: found `{token}`, expected {expected}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub line: usize,
    pub token: String,
    pub expected: String,
}

impl ParseError {
    pub(crate) fn new(
        kind: ErrorKind,
        line: usize,
        token: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            token: token.into(),
            expected: expected.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_line_token_and_expectation() {
        let err = ParseError::new(
            ErrorKind::UnbalancedBlock,
            12,
            "data read",
            "`data end` to close `data` block opened at line 12",
        );
        assert_eq!(
            err.to_string(),
            "line 12: unbalanced block: found `data read`, expected `data end` to close `data` block opened at line 12"
        );
    }
}
