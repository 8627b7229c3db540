use std::fmt;

use sylva_errors::Diagnostic;
use sylva_tree::{TextRange, TextSize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    Syntax,
    NodeType,
    Field,
    Capture,
    Structure,
    Language,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "invalid syntax",
            Self::NodeType => "invalid node type",
            Self::Field => "invalid field",
            Self::Capture => "invalid capture",
            Self::Structure => "impossible pattern",
            Self::Language => "incompatible language",
        })
    }
}

/// Why a query source failed to compile, and where.
///
/// `offset` counts bytes into the query source; `row` and `column` describe
/// the same position.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at {row}:{column}: {message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub offset: usize,
    pub row: usize,
    pub column: usize,
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(kind: QueryErrorKind, source: &str, offset: usize, message: String) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let row = before.matches('\n').count();
        let column = before.rfind('\n').map_or(offset, |newline| offset - newline - 1);
        Self { kind, offset, row, column, message }
    }

    /// The error as a diagnostic over the query source.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let offset = TextSize::new(self.offset as u32);
        Diagnostic::error(format!("{}: {}", self.kind, self.message), TextRange::empty(offset))
    }
}
