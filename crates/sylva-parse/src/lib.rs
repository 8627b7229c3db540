//! The parsing half of the Sylva engine.
//!
//! A [`Parser`] runs a grammar's parse program over text. It first tries a
//! strict pass and falls back to an error-recovering one, so every parse that
//! is not cancelled produces a [`Tree`](sylva_tree::Tree). Given an edited old
//! tree, unchanged subtrees are reused instead of being parsed again.

mod error;
mod event;
mod machine;
mod parser;
mod reuse;

pub use error::{IncludedRangesError, IncompatibleGrammarError, ParseError};
pub use parser::{LogType, Logger, Parser};
pub use sylva_tokenizer::InputEncoding;
