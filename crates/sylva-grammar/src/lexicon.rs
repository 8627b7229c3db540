//! Compiled token recognizers.

use regex::Regex;

use crate::{Symbol, SymbolSet};

/// What a recognizer saw when run at some position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scan {
    /// Length in UTF-8 bytes of the match, if the recognizer matched.
    pub matched: Option<usize>,
    /// Number of UTF-8 bytes that influenced the outcome, counting from the
    /// scan position. Always at least the match length.
    pub examined: usize,
}

#[derive(Clone, Debug)]
pub enum TokenMatcher {
    Literal(Box<str>),
    Regex(Regex),
}

impl TokenMatcher {
    pub fn is_literal(&self) -> bool {
        matches!(self, TokenMatcher::Literal(_))
    }

    /// Runs the recognizer at the start of `text`.
    pub fn scan(&self, text: &str) -> Scan {
        match self {
            TokenMatcher::Literal(literal) => {
                let common = literal
                    .char_indices()
                    .zip(text.chars())
                    .find(|((_, expected), actual)| expected != actual)
                    .map(|((offset, _), _)| offset);
                match common {
                    None if text.len() >= literal.len() => {
                        Scan { matched: Some(literal.len()), examined: literal.len() }
                    }
                    None => Scan { matched: None, examined: text.len() },
                    Some(offset) => Scan { matched: None, examined: offset + next_char_len(text, offset) },
                }
            }
            TokenMatcher::Regex(regex) => match regex.find(text) {
                Some(found) if found.end() > 0 => Scan {
                    matched: Some(found.end()),
                    examined: found.end() + next_char_len(text, found.end()),
                },
                _ => Scan { matched: None, examined: next_char_len(text, 0) },
            },
        }
    }
}

fn next_char_len(text: &str, offset: usize) -> usize {
    text.get(offset..).and_then(|rest| rest.chars().next()).map_or(0, char::len_utf8)
}

#[derive(Clone, Debug)]
pub struct TokenRule {
    pub symbol: Symbol,
    pub matcher: TokenMatcher,
}

/// Lexical part of a grammar.
///
/// Tokens are recognized by longest match. On equal lengths a literal beats a
/// pattern, and after that the token declared first wins.
#[derive(Clone, Debug)]
pub struct Lexicon {
    pub(crate) tokens: Box<[TokenRule]>,
    pub(crate) padding: Regex,
    pub(crate) extras: SymbolSet,
}

impl Lexicon {
    pub fn tokens(&self) -> &[TokenRule] {
        &self.tokens
    }

    /// Pattern for the text skipped between tokens, anchored at the scan
    /// position.
    pub fn padding(&self) -> &Regex {
        &self.padding
    }

    /// Tokens allowed anywhere between other tokens, such as comments.
    pub fn extras(&self) -> &SymbolSet {
        &self.extras
    }
}

pub(crate) fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}
