use thiserror::Error;

/// Reasons a grammar description cannot be turned into parse tables.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar has no rules")]
    NoRules,
    #[error("symbol `{0}` is declared more than once")]
    DuplicateSymbol(Box<str>),
    #[error("rule `{rule}` refers to undeclared symbol `{name}`")]
    UnknownSymbol { rule: Box<str>, name: Box<str> },
    #[error("root `{0}` must be a rule, not a token")]
    InvalidRoot(Box<str>),
    #[error("extra `{0}` must be a declared token")]
    InvalidExtra(Box<str>),
    #[error("token `{0}` can match the empty string")]
    EmptyToken(Box<str>),
    #[error("invalid pattern for token `{name}`")]
    InvalidPattern {
        name: Box<str>,
        #[source]
        source: regex::Error,
    },
    #[error("rule `{0}` is left-recursive")]
    LeftRecursion(Box<str>),
    #[error("rule `{0}` repeats something that can match empty")]
    NullableRepetition(Box<str>),
    #[error("grammar declares more than {max} symbols")]
    TooManySymbols { max: usize },
}
