//! The backtracking machine that runs a grammar's parse program.
//!
//! A pass either accepts, handing back the event log of the surviving path,
//! or gets rejected once every alternative has failed. A pass is strict
//! except at its repair positions: there it may insert missing tokens, skip
//! unexpected input into `ERROR` nodes at repetition boundaries, and swallow
//! trailing input before the end of the document. Each rejected pass reports
//! the furthest position where a token did not match, which becomes a repair
//! position of the next pass.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};
use sylva_grammar::{CallRepair, ERROR_SYMBOL, FieldId, Grammar, Instruction, Pc, SetId, Symbol};
use sylva_tokenizer::{Lexer, Token};
use sylva_tree::Length;

use crate::event::{Event, Marker};
use crate::reuse::ReuseIndex;
use crate::{LogType, Logger, ParseError};

/// Operations between two looks at the cancellation flag and the clock.
const CHECK_INTERVAL: u64 = 100;

/// Everything a pass reads but does not own.
pub(crate) struct Context<'a> {
    pub(crate) grammar: &'a Grammar,
    pub(crate) lexer: Lexer<'a>,
    pub(crate) reuse: &'a ReuseIndex,
    pub(crate) logger: Option<&'a mut Logger>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) cancellation_flag: Option<&'a AtomicBool>,
}

impl Context<'_> {
    pub(crate) fn log(&mut self, kind: LogType, message: fmt::Arguments<'_>) {
        if let Some(logger) = self.logger.as_deref_mut() {
            logger(kind, &message.to_string());
        }
    }

    fn interrupted(&self) -> Option<ParseError> {
        if self.cancellation_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Some(ParseError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(ParseError::TimedOut);
        }
        None
    }
}

fn symbol_name(grammar: &Grammar, symbol: Symbol) -> &str {
    grammar.symbol_name(symbol).unwrap_or("?")
}

fn can_repair(grammar: &Grammar, repair: CallRepair, token: &Token) -> bool {
    grammar.program().set(repair.set).contains(token.symbol)
}

pub(crate) enum Outcome {
    Accepted(Vec<Event>),
    Rejected,
}

enum Step {
    Continue,
    Fail,
    Accept,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    symbol: Symbol,
    /// Where to continue after the rule returns.
    ret: Pc,
    start: Length,
    /// Fields opened by the caller stay below this index.
    field_base: usize,
    /// Furthest absolute byte examined while the rule ran.
    examined: u32,
    /// A repair checkpoint sits right below this call.
    guarded: bool,
}

#[derive(Clone, Copy, Debug)]
enum Resume {
    Alternative(Pc),
    /// Replace a failed call with a missing token.
    Repair { repair: CallRepair, next: Pc },
}

#[derive(Clone, Copy, Debug)]
struct Checkpoint {
    resume: Resume,
    position: Length,
    events: usize,
    calls: usize,
    fields: usize,
}

pub(crate) struct Machine {
    /// Token start offsets where repairs are allowed.
    repair_at: FxHashSet<u32>,
    /// Whether subtrees of the old tree may be spliced in.
    reuse: bool,
    reused: bool,
    furthest_failure: u32,
    pc: Pc,
    position: Length,
    calls: Vec<Frame>,
    backtrack: Vec<Checkpoint>,
    fields: Vec<FieldId>,
    events: Vec<Event>,
    /// Calls known to fail at a position, with what they examined.
    failed: FxHashMap<(Symbol, u32), u32>,
    lookahead: Option<Token>,
    ops: u64,
}

impl Machine {
    pub(crate) fn new(grammar: &Grammar, repair_at: FxHashSet<u32>, reuse: bool) -> Self {
        let root = grammar.root();
        let entry = grammar.program().entry(root).expect("the root symbol is a rule");
        Self {
            repair_at,
            reuse,
            reused: false,
            furthest_failure: 0,
            pc: entry,
            position: Length::ZERO,
            calls: vec![Frame {
                symbol: root,
                ret: Pc::MAX,
                start: Length::ZERO,
                field_base: 0,
                examined: 0,
                guarded: false,
            }],
            backtrack: Vec::new(),
            fields: Vec::new(),
            events: vec![Event::Start { symbol: root, field: None }],
            failed: FxHashMap::default(),
            lookahead: None,
            ops: 0,
        }
    }

    pub(crate) fn is_recovering(&self) -> bool {
        !self.repair_at.is_empty()
    }

    pub(crate) fn repair_positions(&self) -> &FxHashSet<u32> {
        &self.repair_at
    }

    /// Whether the pass spliced in any old subtree.
    pub(crate) fn reused(&self) -> bool {
        self.reused
    }

    /// Start of the furthest token that failed to match.
    pub(crate) fn furthest_failure(&self) -> u32 {
        self.furthest_failure
    }

    /// Runs until the pass is decided or interrupted. An interrupted machine
    /// can be run again to continue where it stopped.
    pub(crate) fn run(&mut self, cx: &mut Context<'_>) -> Result<Outcome, ParseError> {
        let grammar = cx.grammar;
        let program = grammar.program();
        loop {
            self.ops += 1;
            if self.ops % CHECK_INTERVAL == 0 {
                if let Some(error) = cx.interrupted() {
                    tracing::debug!(%error, ops = self.ops, "parse interrupted");
                    return Err(error);
                }
            }

            let step = match program.instruction(self.pc) {
                Instruction::Token { symbol, repair } => self.token(cx, symbol, repair),
                Instruction::Call { symbol, repair } => self.call(cx, symbol, repair),
                Instruction::Return => self.ret(cx),
                Instruction::Choice { alternative } => {
                    self.checkpoint(Resume::Alternative(alternative));
                    self.pc += 1;
                    Step::Continue
                }
                Instruction::Commit { target } => {
                    self.backtrack.pop();
                    self.pc = target;
                    Step::Continue
                }
                Instruction::Fail => Step::Fail,
                Instruction::FieldStart { field } => {
                    self.fields.push(field);
                    self.pc += 1;
                    Step::Continue
                }
                Instruction::FieldEnd => {
                    self.fields.pop();
                    self.pc += 1;
                    Step::Continue
                }
                Instruction::Recover { first, sync, resume } => self.recover(cx, first, sync, resume),
            };

            match step {
                Step::Continue => {}
                Step::Fail => {
                    if !self.backtrack(cx) {
                        return Ok(Outcome::Rejected);
                    }
                }
                Step::Accept => return Ok(Outcome::Accepted(mem::take(&mut self.events))),
            }
        }
    }

    /// Events for a root that holds all of the input in one `ERROR` node.
    pub(crate) fn wrap_all(cx: &mut Context<'_>) -> Vec<Event> {
        let root = cx.grammar.root();
        let mut events = vec![Event::Start { symbol: root, field: None }];
        let marker = Marker::start(&mut events);
        let mut skipped = 0;
        let mut token = cx.lexer.lex(Length::ZERO);
        while !token.is_end() {
            events.push(Event::Token { leaf: token.leaf(), field: None });
            skipped += 1;
            token = cx.lexer.lex(token.end());
        }
        let lookahead_end = u32::from(token.end().bytes);
        if skipped == 0 {
            marker.abandon(&events);
        } else {
            marker.complete(&mut events, ERROR_SYMBOL, lookahead_end);
        }
        cx.log(LogType::Parse, format_args!("wrap {skipped} tokens in an error"));
        events.push(Event::Token { leaf: token.leaf(), field: None });
        events.push(Event::Finish { lookahead_end });
        events
    }

    fn token(&mut self, cx: &mut Context<'_>, symbol: Symbol, repair: Option<SetId>) -> Step {
        let token = self.skip_extras(cx, Some(symbol));
        if token.symbol == symbol {
            self.consume(token, self.field());
            self.pc += 1;
            return Step::Continue;
        }
        let repairable = repair.is_some_and(|set| cx.grammar.program().set(set).contains(token.symbol));
        if repairable && self.may_repair(&token) {
            self.missing(cx, symbol);
            self.pc += 1;
            return Step::Continue;
        }
        self.furthest_failure = self.furthest_failure.max(u32::from(token.start().bytes));
        Step::Fail
    }

    fn call(&mut self, cx: &mut Context<'_>, symbol: Symbol, repair: Option<CallRepair>) -> Step {
        let token = self.skip_extras(cx, None);
        let field = self.field();
        let start = u32::from(self.position.bytes);

        let grammar = cx.grammar;
        if let Some(subtree) = cx.reuse.get(start, symbol).filter(|_| self.reuse) {
            let subtree = subtree.clone();
            self.reused = true;
            let total = subtree.total_size();
            self.examine(start + u32::from(total.bytes) + subtree.lookahead_bytes());
            tracing::trace!(symbol, start, "reusing subtree");
            let name = symbol_name(grammar, symbol);
            cx.log(LogType::Parse, format_args!("reuse {name} at {start}"));
            self.events.push(Event::Reuse { subtree, field });
            self.position += total;
            self.pc += 1;
            return Step::Continue;
        }

        if let Some(&examined) = self.failed.get(&(symbol, start)) {
            self.examine(examined);
            return match repair {
                Some(repair) if self.may_repair(&token) && can_repair(grammar, repair, &token) => {
                    self.missing(cx, repair.placeholder);
                    self.pc += 1;
                    Step::Continue
                }
                _ => Step::Fail,
            };
        }

        let guarded = match repair {
            Some(repair) if self.may_repair(&token) => {
                self.checkpoint(Resume::Repair { repair, next: self.pc + 1 });
                true
            }
            _ => false,
        };
        let entry = grammar.program().entry(symbol).expect("only rules are called");
        self.calls.push(Frame {
            symbol,
            ret: self.pc + 1,
            start: self.position,
            field_base: self.fields.len(),
            examined: 0,
            guarded,
        });
        self.events.push(Event::Start { symbol, field });
        self.pc = entry;
        Step::Continue
    }

    fn ret(&mut self, cx: &mut Context<'_>) -> Step {
        if self.calls.len() == 1 {
            return self.accept(cx);
        }
        let frame = self.calls.pop().expect("returning without a call");
        if frame.guarded {
            self.backtrack.pop();
        }
        self.events.push(Event::Finish { lookahead_end: frame.examined });
        self.examine(frame.examined);
        self.pc = frame.ret;
        Step::Continue
    }

    /// The root rule returned: what is left must be the end of the input.
    fn accept(&mut self, cx: &mut Context<'_>) -> Step {
        let mut token = self.skip_extras(cx, None);
        if !token.is_end() {
            if !self.may_repair(&token) {
                self.furthest_failure = self.furthest_failure.max(u32::from(token.start().bytes));
                return Step::Fail;
            }
            let marker = Marker::start(&mut self.events);
            while !token.is_end() {
                self.consume(token, None);
                token = self.lex(cx);
            }
            let examined = self.examined();
            marker.complete(&mut self.events, ERROR_SYMBOL, examined);
            cx.log(LogType::Parse, format_args!("skip trailing input"));
        }
        self.consume(token, None);
        self.events.push(Event::Finish { lookahead_end: self.examined() });
        Step::Accept
    }

    fn recover(&mut self, cx: &mut Context<'_>, first: SetId, sync: SetId, resume: Pc) -> Step {
        self.pc += 1;
        if !self.is_recovering() {
            return Step::Continue;
        }
        let grammar = cx.grammar;
        let program = grammar.program();
        let (first, sync) = (program.set(first), program.set(sync));
        let mut token = self.skip_extras(cx, None);
        if token.is_end() || sync.contains(token.symbol) || !self.may_repair(&token) {
            return Step::Continue;
        }

        let marker = Marker::start(&mut self.events);
        let mut skipped = 0;
        while !token.is_end() && !sync.contains(token.symbol) && (skipped == 0 || !first.contains(token.symbol)) {
            self.consume(token, None);
            skipped += 1;
            token = self.skip_extras(cx, None);
        }
        let examined = self.examined();
        marker.complete(&mut self.events, ERROR_SYMBOL, examined);
        cx.log(LogType::Parse, format_args!("skip {skipped} unexpected tokens"));
        self.pc = resume;
        Step::Continue
    }

    /// Unwinds to the newest checkpoint that can still make progress.
    fn backtrack(&mut self, cx: &mut Context<'_>) -> bool {
        while let Some(checkpoint) = self.backtrack.pop() {
            while self.calls.len() > checkpoint.calls {
                let frame = self.calls.pop().expect("checkpoint below the root call");
                self.failed.insert((frame.symbol, u32::from(frame.start.bytes)), frame.examined);
                self.examine(frame.examined);
            }
            self.events.truncate(checkpoint.events);
            self.fields.truncate(checkpoint.fields);
            self.position = checkpoint.position;

            match checkpoint.resume {
                Resume::Alternative(pc) => {
                    self.pc = pc;
                    return true;
                }
                Resume::Repair { repair, next } => {
                    // Pushed only where `may_repair` holds for the next token.
                    let token = self.skip_extras(cx, None);
                    if can_repair(cx.grammar, repair, &token) {
                        self.missing(cx, repair.placeholder);
                        self.pc = next;
                        return true;
                    }
                }
            }
        }
        false
    }

    fn may_repair(&self, token: &Token) -> bool {
        self.repair_at.contains(&u32::from(token.start().bytes))
    }

    fn checkpoint(&mut self, resume: Resume) {
        self.backtrack.push(Checkpoint {
            resume,
            position: self.position,
            events: self.events.len(),
            calls: self.calls.len(),
            fields: self.fields.len(),
        });
    }

    fn missing(&mut self, cx: &mut Context<'_>, symbol: Symbol) {
        let name = symbol_name(cx.grammar, symbol);
        cx.log(LogType::Parse, format_args!("insert missing {name}"));
        let field = self.field();
        self.events.push(Event::Missing { symbol, field });
    }

    /// Lexes the next token, adding any extras before it to the current node.
    /// An extra that is `expected` is returned instead. Unrecognized text at
    /// a repair position is wrapped in an `ERROR` node and skipped as well.
    fn skip_extras(&mut self, cx: &mut Context<'_>, expected: Option<Symbol>) -> Token {
        loop {
            let mut token = self.lex(cx);
            if token.is_unknown() && self.may_repair(&token) {
                let marker = Marker::start(&mut self.events);
                while token.is_unknown() {
                    self.consume(token, None);
                    token = self.lex(cx);
                }
                let examined = self.examined();
                marker.complete(&mut self.events, ERROR_SYMBOL, examined);
                cx.log(LogType::Parse, format_args!("skip unrecognized text"));
                continue;
            }
            if !token.is_extra || Some(token.symbol) == expected {
                return token;
            }
            self.consume(token, None);
        }
    }

    fn lex(&mut self, cx: &mut Context<'_>) -> Token {
        let token = match self.lookahead {
            Some(token) if token.position == self.position => token,
            _ => {
                let token = cx.lexer.lex(self.position);
                if cx.logger.is_some() {
                    let name = symbol_name(cx.grammar, token.symbol);
                    let size = u32::from(token.size.bytes);
                    cx.log(LogType::Lex, format_args!("lexed {name} size:{size}"));
                }
                self.lookahead = Some(token);
                token
            }
        };
        self.examine(u32::from(token.end().bytes) + token.lookahead_bytes);
        token
    }

    fn consume(&mut self, token: Token, field: Option<FieldId>) {
        self.events.push(Event::Token { leaf: token.leaf(), field });
        self.position = token.end();
    }

    /// The innermost field opened by the current rule.
    fn field(&self) -> Option<FieldId> {
        let base = self.calls.last().map_or(0, |frame| frame.field_base);
        self.fields.get(base..).and_then(<[FieldId]>::last).copied()
    }

    fn examine(&mut self, end: u32) {
        if let Some(frame) = self.calls.last_mut() {
            frame.examined = frame.examined.max(end);
        }
    }

    fn examined(&self) -> u32 {
        self.calls.last().map_or(0, |frame| frame.examined)
    }
}
