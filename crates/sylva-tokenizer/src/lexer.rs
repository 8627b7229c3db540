use sylva_grammar::{END_SYMBOL, ERROR_SYMBOL, Grammar, Symbol};
use sylva_tree::{Leaf, Length, Range};

use crate::SourceText;

/// A token produced at some position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    /// Where lexing started.
    pub position: Length,
    /// Skipped text, including any gap between included ranges.
    pub padding: Length,
    pub size: Length,
    /// Encoded bytes past the end that influenced the token.
    pub lookahead_bytes: u32,
    pub is_extra: bool,
}

impl Token {
    pub fn start(&self) -> Length {
        self.position + self.padding
    }

    pub fn end(&self) -> Length {
        self.start() + self.size
    }

    pub fn is_end(&self) -> bool {
        self.symbol == END_SYMBOL
    }

    /// Whether the lexer found text it does not recognize.
    pub fn is_unknown(&self) -> bool {
        self.symbol == ERROR_SYMBOL
    }

    pub fn leaf(&self) -> Leaf {
        Leaf {
            symbol: self.symbol,
            padding: self.padding,
            size: self.size,
            lookahead_bytes: self.lookahead_bytes,
            is_extra: self.is_extra,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Span {
    start: Length,
    end_encoded: u32,
    end_utf8: usize,
}

/// Turns text into tokens on demand.
///
/// Lexing is a pure function of the start position, so the parser may lex the
/// same position any number of times, for instance after backtracking.
pub struct Lexer<'a> {
    grammar: &'a Grammar,
    source: &'a SourceText,
    spans: Vec<Span>,
}

impl<'a> Lexer<'a> {
    /// `ranges` must be sorted and non-overlapping; an empty slice means the
    /// whole document.
    pub fn new(grammar: &'a Grammar, source: &'a SourceText, ranges: &[Range]) -> Self {
        let whole = [Range::EVERYTHING];
        let ranges = if ranges.is_empty() { &whole[..] } else { ranges };
        let spans = ranges
            .iter()
            .map(|range| Span {
                start: range.start(),
                end_encoded: range.end_byte,
                end_utf8: source.to_utf8(range.end_byte),
            })
            .collect();
        Self { grammar, source, spans }
    }

    pub fn source(&self) -> &'a SourceText {
        self.source
    }

    pub fn lex(&self, position: Length) -> Token {
        let text_len = self.source.as_str().len();
        let padding = self.grammar.lexicon().padding();
        let mut start = position;
        loop {
            let Some(span) = self.spans.iter().find(|span| span.end_encoded > u32::from(start.bytes))
            else {
                return self.end_token(position, start);
            };
            if start.bytes < span.start.bytes {
                start = span.start;
            }
            let from = self.source.to_utf8(start.bytes.into());
            if from >= text_len {
                return self.end_token(position, start);
            }
            let text = &self.source.as_str()[from..span.end_utf8.max(from)];
            let skipped = padding.find(text).map_or(0, |found| found.end());
            start += self.source.measure(from, from + skipped);
            if skipped < text.len() {
                return self.scan(position, start, from + skipped, span.end_utf8);
            }
            if from + skipped >= text_len {
                return self.end_token(position, start);
            }
            // The included range is exhausted, so the next iteration moves on
            // to the following one.
        }
    }

    fn end_token(&self, position: Length, start: Length) -> Token {
        Token {
            symbol: END_SYMBOL,
            position,
            padding: start - position,
            size: Length::ZERO,
            lookahead_bytes: 0,
            is_extra: false,
        }
    }

    fn scan(&self, position: Length, start: Length, from: usize, limit: usize) -> Token {
        let lexicon = self.grammar.lexicon();
        let text = &self.source.as_str()[from..limit];

        let mut best: Option<(usize, bool, Symbol)> = None;
        let mut examined = 0;
        for rule in lexicon.tokens() {
            let scan = rule.matcher.scan(text);
            examined = examined.max(scan.examined);
            let Some(len) = scan.matched else { continue };
            let is_literal = rule.matcher.is_literal();
            let better = match best {
                None => true,
                Some((best_len, best_literal, _)) => {
                    len > best_len || (len == best_len && is_literal && !best_literal)
                }
            };
            if better {
                best = Some((len, is_literal, rule.symbol));
            }
        }

        let (len, symbol) = match best {
            Some((len, _, symbol)) => (len, symbol),
            None => {
                let len = text.chars().next().map_or(0, char::len_utf8);
                tracing::trace!(offset = from, "unrecognized character");
                (len, ERROR_SYMBOL)
            }
        };
        let end = self.source.to_encoded(from + len);
        let examined_end = self.source.to_encoded(from + examined.max(len));
        Token {
            symbol,
            position,
            padding: start - position,
            size: self.source.measure(from, from + len),
            lookahead_bytes: examined_end - end,
            is_extra: lexicon.extras().contains(symbol),
        }
    }
}
