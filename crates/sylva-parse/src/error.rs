use sylva_tokenizer::DecodeError;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("parse was cancelled")]
    Cancelled,
    #[error("parse timed out")]
    TimedOut,
    #[error("no grammar was set")]
    NoGrammar,
    #[error("invalid input length: {0}")]
    InvalidEncodingLength(#[from] DecodeError),
}

/// Included ranges must be ordered and must not overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("included range {index} overlaps or precedes the range before it")]
pub struct IncludedRangesError {
    pub index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("incompatible grammar version {version}, expected {min} through {max}")]
pub struct IncompatibleGrammarError {
    pub version: u32,
    pub min: u32,
    pub max: u32,
}
