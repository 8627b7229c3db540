//! Grammar-driven lexing over decoded source text.

mod lexer;
mod source;
#[cfg(test)]
mod tests;

pub use lexer::{Lexer, Token};
pub use source::{DecodeError, InputEncoding, SourceText};
