//! Parse programs: rule bodies lowered to instructions for a backtracking
//! machine.
//!
//! Every rule compiles to a straight-line block ending in [`Instruction::Return`].
//! Ordered choice pushes a backtrack entry that [`Instruction::Commit`] drops
//! once an alternative has matched. Repair and recovery metadata is attached to
//! instructions as indices into the program's symbol sets; a strict parse
//! ignores it.

use rustc_hash::FxHashMap;

use crate::analysis::{Analysis, Continuation, Expr};
use crate::{FieldId, Symbol, SymbolSet};

pub type Pc = u32;
pub type SetId = u32;

/// Lets a recovering parse stand in a missing node for a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallRepair {
    /// Lookahead tokens that justify the repair.
    pub set: SetId,
    /// Token inserted as the missing node.
    pub placeholder: Symbol,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Consumes one token. When `repair` is present and the lookahead is in
    /// that set, a recovering parse inserts the token as missing instead.
    Token { symbol: Symbol, repair: Option<SetId> },
    /// Parses a rule, producing one node.
    Call { symbol: Symbol, repair: Option<CallRepair> },
    Return,
    /// Pushes a backtrack entry resuming at `alternative`.
    Choice { alternative: Pc },
    /// Drops the newest backtrack entry and jumps.
    Commit { target: Pc },
    Fail,
    FieldStart { field: FieldId },
    FieldEnd,
    /// Reached when a repetition stops. A recovering parse skips tokens that
    /// are neither in `first` nor in `sync`, wraps them in an error node and
    /// resumes the repetition at `resume`.
    Recover { first: SetId, sync: SetId, resume: Pc },
}

#[derive(Clone, Debug)]
pub struct Program {
    instructions: Box<[Instruction]>,
    entries: Box<[Option<Pc>]>,
    sets: Box<[SymbolSet]>,
}

impl Program {
    pub fn instruction(&self, pc: Pc) -> Instruction {
        self.instructions[pc as usize]
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Entry point of a rule, `None` for tokens.
    pub fn entry(&self, symbol: Symbol) -> Option<Pc> {
        self.entries.get(usize::from(symbol)).copied().flatten()
    }

    pub fn set(&self, id: SetId) -> &SymbolSet {
        &self.sets[id as usize]
    }

    pub(crate) fn lower(rules: &[Option<Expr>], analysis: &Analysis) -> Self {
        let mut lowering = Lowering {
            analysis,
            rule: 0,
            instructions: Vec::new(),
            sets: Vec::new(),
            set_ids: FxHashMap::default(),
        };
        let entries = rules
            .iter()
            .enumerate()
            .map(|(symbol, rule)| {
                let expr = rule.as_ref()?;
                let entry = lowering.here();
                lowering.rule = symbol as Symbol;
                lowering.expr(expr, &Continuation::at_end(analysis.symbol_count()), false);
                lowering.emit(Instruction::Return);
                Some(entry)
            })
            .collect();
        Self {
            instructions: lowering.instructions.into_boxed_slice(),
            entries,
            sets: lowering.sets.into_boxed_slice(),
        }
    }
}

struct Lowering<'a> {
    analysis: &'a Analysis,
    rule: Symbol,
    instructions: Vec<Instruction>,
    sets: Vec<SymbolSet>,
    set_ids: FxHashMap<SymbolSet, SetId>,
}

impl Lowering<'_> {
    fn here(&self) -> Pc {
        self.instructions.len() as Pc
    }

    fn emit(&mut self, instruction: Instruction) -> Pc {
        let pc = self.here();
        self.instructions.push(instruction);
        pc
    }

    fn patch(&mut self, at: Pc, target: Pc) {
        match &mut self.instructions[at as usize] {
            Instruction::Choice { alternative: slot } | Instruction::Commit { target: slot } => {
                *slot = target;
            }
            _ => unreachable!(),
        }
    }

    fn intern(&mut self, set: SymbolSet) -> SetId {
        if let Some(&id) = self.set_ids.get(&set) {
            return id;
        }
        let id = self.sets.len() as SetId;
        self.sets.push(set.clone());
        self.set_ids.insert(set, id);
        id
    }

    /// Lowers `expr`. `committed` is set when the enclosing sequence has
    /// already consumed input, which is when inserting a missing node is
    /// allowed.
    fn expr(&mut self, expr: &Expr, after: &Continuation, committed: bool) {
        match expr {
            Expr::Blank => {}
            Expr::Token(symbol) => {
                let repair = self.repair_set(after, committed);
                self.emit(Instruction::Token { symbol: *symbol, repair });
            }
            Expr::Call(symbol) => {
                let repair = self.repair_set(after, committed).and_then(|set| {
                    let first = self.analysis.first(*symbol);
                    let placeholder = first.iter().next()?;
                    Some(CallRepair { set, placeholder })
                });
                self.emit(Instruction::Call { symbol: *symbol, repair });
            }
            Expr::Seq(items) => {
                let mut afters = Vec::with_capacity(items.len());
                let mut next = after.clone();
                for item in items.iter().rev() {
                    let before = next.before(self.analysis, item);
                    afters.push(next);
                    next = before;
                }
                let mut committed = committed;
                for (item, after) in items.iter().zip(afters.iter().rev()) {
                    self.expr(item, after, committed);
                    committed |= !self.analysis.first_of(item).1;
                }
            }
            Expr::Choice(alternatives) => match alternatives.as_slice() {
                [] => {
                    self.emit(Instruction::Fail);
                }
                [only] => self.expr(only, after, committed),
                [init @ .., last] => {
                    let mut commits = Vec::with_capacity(init.len());
                    for alternative in init {
                        let choice = self.emit(Instruction::Choice { alternative: Pc::MAX });
                        self.expr(alternative, after, false);
                        commits.push(self.emit(Instruction::Commit { target: Pc::MAX }));
                        let next = self.here();
                        self.patch(choice, next);
                    }
                    self.expr(last, after, false);
                    let end = self.here();
                    for commit in commits {
                        self.patch(commit, end);
                    }
                }
            },
            Expr::Optional(inner) => {
                let choice = self.emit(Instruction::Choice { alternative: Pc::MAX });
                self.expr(inner, after, false);
                let commit = self.emit(Instruction::Commit { target: Pc::MAX });
                let end = self.here();
                self.patch(choice, end);
                self.patch(commit, end);
            }
            Expr::Repeat(inner) => self.repeat(inner, after),
            Expr::Repeat1(inner) => {
                let mut again = after.clone();
                again.first.union_with(&self.analysis.first_of(inner).0);
                self.expr(inner, &again, committed);
                self.repeat(inner, after);
            }
            Expr::Field(field, inner) => {
                self.emit(Instruction::FieldStart { field: *field });
                self.expr(inner, after, committed);
                self.emit(Instruction::FieldEnd);
            }
        }
    }

    fn repeat(&mut self, inner: &Expr, after: &Continuation) {
        let first = self.analysis.first_of(inner).0;
        let mut again = after.clone();
        again.first.union_with(&first);

        let start = self.emit(Instruction::Choice { alternative: Pc::MAX });
        self.expr(inner, &again, false);
        self.emit(Instruction::Commit { target: start });
        let stop = self.here();
        self.patch(start, stop);

        let mut sync = self.analysis.expected_after(self.rule, after);
        sync.insert(crate::END_SYMBOL);
        let first = self.intern(first);
        let sync = self.intern(sync);
        self.emit(Instruction::Recover { first, sync, resume: start });
    }

    fn repair_set(&mut self, after: &Continuation, committed: bool) -> Option<SetId> {
        if !committed {
            return None;
        }
        let expected = self.analysis.expected_after(self.rule, after);
        (!expected.is_empty()).then(|| self.intern(expected))
    }
}
