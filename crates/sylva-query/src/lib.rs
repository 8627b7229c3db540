//! Tree pattern queries.
//!
//! A [`Query`] is compiled from S-expression patterns against one grammar.
//! A [`QueryCursor`] runs it over a syntax tree and yields matches in
//! document order, or the captures of those matches one at a time.

mod cursor;
mod error;
mod matcher;
mod parser;
mod pattern;
mod predicate;
mod query;

#[cfg(test)]
mod tests;

pub use cursor::{QueryCapture, QueryCursor, QueryMatch, QueryMatches};
pub use error::{QueryError, QueryErrorKind};
pub use pattern::CaptureQuantifier;
pub use predicate::{PredicateStep, QueryPredicate, QueryPredicateArg};
pub use query::Query;
