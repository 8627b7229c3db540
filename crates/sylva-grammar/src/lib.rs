//! Grammar tables for the Sylva parsing engine.
//!
//! A [`Grammar`] is built once from rules and tokens with a
//! [`GrammarBuilder`], validated, and then shared read-only by any number of
//! parsers, trees and queries.

mod analysis;
mod error;
mod grammar;
mod lexicon;
mod program;
mod rule;
mod symbol;
mod symbol_set;

pub use error::GrammarError;
pub use grammar::{Grammar, GrammarBuilder};
pub use lexicon::{Lexicon, Scan, TokenMatcher, TokenRule};
pub use program::{CallRepair, Instruction, Pc, Program, SetId};
pub use rule::{Rule, TokenPattern};
pub use symbol::{END_SYMBOL, ERROR_SYMBOL, FieldId, Symbol, SymbolMetadata, SymbolType};
pub use symbol_set::SymbolSet;

/// Table format version produced by this crate.
pub const ABI_VERSION: u32 = 14;

/// Oldest table format a parser still accepts.
pub const MIN_COMPATIBLE_ABI_VERSION: u32 = 13;
