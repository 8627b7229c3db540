use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use sylva_grammar::{ABI_VERSION, Grammar, MIN_COMPATIBLE_ABI_VERSION};
use sylva_tokenizer::{InputEncoding, Lexer, SourceText};
use sylva_tree::{Range, Tree};

use crate::event::build_tree;
use crate::machine::{Context, Machine, Outcome};
use crate::reuse::ReuseIndex;
use crate::{IncludedRangesError, IncompatibleGrammarError, ParseError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogType {
    Parse,
    Lex,
}

/// Receives a message for every step the parser takes. Purely observational.
pub type Logger = Box<dyn FnMut(LogType, &str) + Send>;

/// A pass that was interrupted by cancellation or a timeout.
struct Suspended {
    machine: Machine,
    reuse: ReuseIndex,
    grammar: Grammar,
    encoded_len: u32,
    included_ranges: Vec<Range>,
}

/// Turns text into [`Tree`]s with a [`Grammar`].
///
/// When a parse is cancelled or times out, its progress is kept and the next
/// call to one of the `parse` methods picks it up again, as long as the
/// grammar, the included ranges and the input length are unchanged. Call
/// [`Parser::reset`] to start over instead.
pub struct Parser {
    grammar: Option<Grammar>,
    included_ranges: Vec<Range>,
    timeout_micros: u64,
    cancellation_flag: Option<Arc<AtomicBool>>,
    logger: Option<Logger>,
    suspended: Option<Suspended>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("grammar", &self.grammar)
            .field("included_ranges", &self.included_ranges)
            .field("timeout_micros", &self.timeout_micros)
            .field("suspended", &self.suspended.is_some())
            .finish_non_exhaustive()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            grammar: None,
            included_ranges: vec![Range::EVERYTHING],
            timeout_micros: 0,
            cancellation_flag: None,
            logger: None,
            suspended: None,
        }
    }

    /// Sets the grammar to parse with, rejecting tables built for an ABI
    /// version this parser does not understand.
    pub fn set_grammar(&mut self, grammar: &Grammar) -> Result<(), IncompatibleGrammarError> {
        let version = grammar.abi_version();
        if !(MIN_COMPATIBLE_ABI_VERSION..=ABI_VERSION).contains(&version) {
            return Err(IncompatibleGrammarError {
                version,
                min: MIN_COMPATIBLE_ABI_VERSION,
                max: ABI_VERSION,
            });
        }
        self.reset();
        self.grammar = Some(grammar.clone());
        Ok(())
    }

    pub fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    /// Restricts parsing to `ranges`. They must be ordered and must not
    /// overlap; on error the previous ranges stay in effect. An empty slice
    /// means the whole document.
    pub fn set_included_ranges(&mut self, ranges: &[Range]) -> Result<(), IncludedRangesError> {
        let mut previous_end = 0;
        for (index, range) in ranges.iter().enumerate() {
            if range.start_byte < previous_end || range.end_byte < range.start_byte {
                return Err(IncludedRangesError { index });
            }
            previous_end = range.end_byte;
        }
        self.included_ranges =
            if ranges.is_empty() { vec![Range::EVERYTHING] } else { ranges.to_vec() };
        Ok(())
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.included_ranges
    }

    /// Limits how long a single call to `parse` may run. Zero means no limit.
    pub fn set_timeout_micros(&mut self, timeout_micros: u64) {
        self.timeout_micros = timeout_micros;
    }

    pub fn timeout_micros(&self) -> u64 {
        self.timeout_micros
    }

    /// Parsing stops with [`ParseError::Cancelled`] soon after the flag is
    /// set.
    pub fn set_cancellation_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.cancellation_flag = flag;
    }

    pub fn cancellation_flag(&self) -> Option<&Arc<AtomicBool>> {
        self.cancellation_flag.as_ref()
    }

    pub fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = logger;
    }

    /// Forgets an interrupted parse so the next one starts from scratch.
    pub fn reset(&mut self) {
        if self.suspended.take().is_some() {
            tracing::debug!("dropped suspended parse");
        }
    }

    /// Parses `input` in the given encoding. `old_tree` must already have been
    /// edited to match `input`; its unchanged subtrees are reused.
    pub fn parse(
        &mut self,
        input: &[u8],
        encoding: InputEncoding,
        old_tree: Option<&Tree>,
    ) -> Result<Tree, ParseError> {
        let source = SourceText::decode(input, encoding)?;
        self.parse_source(&source, old_tree)
    }

    pub fn parse_str(&mut self, text: &str, old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
        self.parse_source(&SourceText::from(text), old_tree)
    }

    /// Parses UTF-16 text. Offsets in the resulting tree count bytes, two per
    /// code unit.
    pub fn parse_utf16(&mut self, units: &[u16], old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
        self.parse_source(&SourceText::from_utf16(units), old_tree)
    }

    fn parse_source(&mut self, source: &SourceText, old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
        let grammar = self.grammar.clone().ok_or(ParseError::NoGrammar)?;
        let _span =
            tracing::debug_span!("parse", grammar = grammar.name(), len = source.encoded_len()).entered();

        let (mut machine, reuse) = match self.suspended.take() {
            Some(suspended)
                if suspended.grammar == grammar
                    && suspended.encoded_len == source.encoded_len()
                    && suspended.included_ranges == self.included_ranges =>
            {
                tracing::debug!("resuming suspended parse");
                (suspended.machine, suspended.reuse)
            }
            stale => {
                if stale.is_some() {
                    tracing::debug!("input changed, dropped suspended parse");
                }
                let reuse = match old_tree {
                    Some(old) if *old.grammar() == grammar => ReuseIndex::new(old, &self.included_ranges),
                    Some(_) => {
                        tracing::debug!("old tree was built with another grammar");
                        ReuseIndex::default()
                    }
                    None => ReuseIndex::default(),
                };
                (Machine::new(&grammar, FxHashSet::default(), true), reuse)
            }
        };

        let deadline = (self.timeout_micros > 0)
            .then(|| Instant::now() + Duration::from_micros(self.timeout_micros));
        let mut cx = Context {
            grammar: &grammar,
            lexer: Lexer::new(&grammar, source, &self.included_ranges),
            reuse: &reuse,
            logger: self.logger.as_mut(),
            deadline,
            cancellation_flag: self.cancellation_flag.as_deref(),
        };
        let outcome = loop {
            match machine.run(&mut cx) {
                Ok(Outcome::Accepted(events)) => break Ok(events),
                Ok(Outcome::Rejected) if machine.reused() => {
                    // Where a pass fails depends on the parts it parsed, so
                    // recovery starts over without the old tree.
                    tracing::debug!("pass with reused subtrees failed, parsing from scratch");
                    cx.log(LogType::Parse, format_args!("restart without reuse"));
                    machine = Machine::new(&grammar, machine.repair_positions().clone(), false);
                }
                Ok(Outcome::Rejected) => {
                    let furthest = machine.furthest_failure();
                    let mut repair_at = machine.repair_positions().clone();
                    if !repair_at.insert(furthest) {
                        break Ok(Machine::wrap_all(&mut cx));
                    }
                    tracing::debug!(furthest, passes = repair_at.len(), "pass failed, recovering");
                    cx.log(LogType::Parse, format_args!("restart with recovery at {furthest}"));
                    machine = Machine::new(&grammar, repair_at, false);
                }
                Err(error) => break Err(error),
            }
        };
        drop(cx);

        match outcome {
            Ok(events) => {
                let root = build_tree(&grammar, events);
                Ok(Tree::new(root, grammar, self.included_ranges.clone()))
            }
            Err(error) => {
                self.suspended = Some(Suspended {
                    machine,
                    reuse,
                    grammar,
                    encoded_len: source.encoded_len(),
                    included_ranges: self.included_ranges.clone(),
                });
                Err(error)
            }
        }
    }
}
