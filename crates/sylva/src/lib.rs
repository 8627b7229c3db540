//! Incremental parsing with grammar tables.
//!
//! A [`Grammar`] describes a language. A [`Parser`] turns text into a
//! [`Tree`], which can be edited in place with [`Tree::edit`] and handed back
//! to the parser so unchanged subtrees are reused. [`Query`] and
//! [`QueryCursor`] find nodes by structural patterns.

pub use sylva_errors::{Diagnostic, Renderer, Severity};
pub use sylva_grammar::{
    ABI_VERSION, END_SYMBOL, ERROR_SYMBOL, FieldId, Grammar, GrammarBuilder, GrammarError,
    MIN_COMPATIBLE_ABI_VERSION, Rule, Symbol, SymbolType, TokenPattern,
};
pub use sylva_parse::{
    IncludedRangesError, IncompatibleGrammarError, InputEncoding, LogType, Logger, ParseError,
    Parser,
};
pub use sylva_query::{
    CaptureQuantifier, PredicateStep, Query, QueryCapture, QueryCursor, QueryError,
    QueryErrorKind, QueryMatch, QueryMatches, QueryPredicate, QueryPredicateArg,
};
pub use sylva_tree::{
    Children, EditError, InputEdit, Length, Node, Point, Preorder, Range, TextRange, TextSize,
    Tree, TreeCursor, WalkEvent,
};
