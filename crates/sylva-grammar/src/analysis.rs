//! Static analysis over resolved rules: nullability, FIRST and FOLLOW sets,
//! and the structural checks a grammar must pass before it can be used.

use crate::{END_SYMBOL, FieldId, Symbol, SymbolSet};

/// A rule body with every name resolved to a symbol.
#[derive(Clone, Debug)]
pub(crate) enum Expr {
    Blank,
    Token(Symbol),
    Call(Symbol),
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    Repeat1(Box<Expr>),
    Optional(Box<Expr>),
    Field(FieldId, Box<Expr>),
}

/// What may come after some point inside a rule body.
#[derive(Clone, Debug)]
pub(crate) struct Continuation {
    pub(crate) first: SymbolSet,
    /// Whether everything after the point can match empty, so the rule's own
    /// FOLLOW set applies too.
    pub(crate) reaches_end: bool,
}

impl Continuation {
    pub(crate) fn at_end(symbol_count: usize) -> Self {
        Self { first: SymbolSet::with_capacity(symbol_count), reaches_end: true }
    }

    /// The continuation in front of `expr`, given this one after it.
    pub(crate) fn before(&self, analysis: &Analysis, expr: &Expr) -> Self {
        let (mut first, nullable) = analysis.first_of(expr);
        if nullable {
            first.union_with(&self.first);
            Self { first, reaches_end: self.reaches_end }
        } else {
            Self { first, reaches_end: false }
        }
    }
}

pub(crate) struct Analysis {
    symbol_count: usize,
    nullable: Vec<bool>,
    first: Vec<SymbolSet>,
    follow: Vec<SymbolSet>,
}

impl Analysis {
    /// `rules` is indexed by symbol; token symbols have no body.
    pub(crate) fn new(rules: &[Option<Expr>], root: Symbol) -> Self {
        let symbol_count = rules.len();
        let mut this = Self {
            symbol_count,
            nullable: vec![false; symbol_count],
            first: vec![SymbolSet::with_capacity(symbol_count); symbol_count],
            follow: vec![SymbolSet::with_capacity(symbol_count); symbol_count],
        };

        for (symbol, rule) in rules.iter().enumerate() {
            if rule.is_none() && symbol != usize::from(END_SYMBOL) {
                this.first[symbol].insert(symbol as Symbol);
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (symbol, expr) in bodies(rules) {
                let (first, nullable) = this.first_of(expr);
                changed |= this.first[usize::from(symbol)].union_with(&first);
                if nullable && !this.nullable[usize::from(symbol)] {
                    this.nullable[usize::from(symbol)] = true;
                    changed = true;
                }
            }
        }

        this.follow[usize::from(root)].insert(END_SYMBOL);
        let mut changed = true;
        while changed {
            changed = false;
            for (symbol, expr) in bodies(rules) {
                changed |= this.propagate_follow(symbol, expr, &Continuation::at_end(symbol_count));
            }
        }

        this
    }

    pub(crate) fn symbol_count(&self) -> usize {
        self.symbol_count
    }

    pub(crate) fn first(&self, symbol: Symbol) -> &SymbolSet {
        &self.first[usize::from(symbol)]
    }

    /// FIRST set of `expr` and whether it can match empty.
    pub(crate) fn first_of(&self, expr: &Expr) -> (SymbolSet, bool) {
        match expr {
            Expr::Blank => (SymbolSet::with_capacity(self.symbol_count), true),
            Expr::Token(symbol) | Expr::Call(symbol) => {
                (self.first[usize::from(*symbol)].clone(), self.nullable[usize::from(*symbol)])
            }
            Expr::Seq(items) => {
                let mut first = SymbolSet::with_capacity(self.symbol_count);
                for item in items {
                    let (item_first, nullable) = self.first_of(item);
                    first.union_with(&item_first);
                    if !nullable {
                        return (first, false);
                    }
                }
                (first, true)
            }
            Expr::Choice(alternatives) => {
                let mut first = SymbolSet::with_capacity(self.symbol_count);
                let mut nullable = false;
                for alternative in alternatives {
                    let (alternative_first, alternative_nullable) = self.first_of(alternative);
                    first.union_with(&alternative_first);
                    nullable |= alternative_nullable;
                }
                (first, nullable)
            }
            Expr::Repeat(inner) | Expr::Optional(inner) => (self.first_of(inner).0, true),
            Expr::Repeat1(inner) | Expr::Field(_, inner) => self.first_of(inner),
        }
    }

    /// Tokens that may legally appear after the point described by `after`
    /// inside the body of `rule`.
    pub(crate) fn expected_after(&self, rule: Symbol, after: &Continuation) -> SymbolSet {
        let mut expected = after.first.clone();
        if after.reaches_end {
            expected.union_with(&self.follow[usize::from(rule)]);
        }
        expected
    }

    fn propagate_follow(&mut self, rule: Symbol, expr: &Expr, after: &Continuation) -> bool {
        match expr {
            Expr::Blank | Expr::Token(_) => false,
            Expr::Call(callee) => {
                let expected = self.expected_after(rule, after);
                self.follow[usize::from(*callee)].union_with(&expected)
            }
            Expr::Seq(items) => {
                let mut changed = false;
                let mut after = after.clone();
                for item in items.iter().rev() {
                    changed |= self.propagate_follow(rule, item, &after);
                    after = after.before(self, item);
                }
                changed
            }
            Expr::Choice(alternatives) => {
                let mut changed = false;
                for alternative in alternatives {
                    changed |= self.propagate_follow(rule, alternative, after);
                }
                changed
            }
            Expr::Optional(inner) | Expr::Field(_, inner) => {
                self.propagate_follow(rule, inner, after)
            }
            Expr::Repeat(inner) | Expr::Repeat1(inner) => {
                let mut again = after.clone();
                again.first.union_with(&self.first_of(inner).0);
                self.propagate_follow(rule, inner, &again)
            }
        }
    }

    /// Finds a repetition whose body can match empty.
    pub(crate) fn nullable_repetition(&self, rules: &[Option<Expr>]) -> Option<Symbol> {
        bodies(rules).find_map(|(symbol, expr)| {
            let mut found = false;
            walk(expr, &mut |expr| {
                if let Expr::Repeat(inner) | Expr::Repeat1(inner) = expr {
                    found |= self.first_of(inner).1;
                }
            });
            found.then_some(symbol)
        })
    }

    /// Finds a rule that can reach itself without consuming input.
    pub(crate) fn left_recursion(&self, rules: &[Option<Expr>]) -> Option<Symbol> {
        let edges: Vec<Vec<Symbol>> = rules
            .iter()
            .map(|rule| {
                let mut calls = Vec::new();
                if let Some(expr) = rule {
                    self.left_calls(expr, &mut calls);
                }
                calls
            })
            .collect();

        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(symbol: Symbol, edges: &[Vec<Symbol>], marks: &mut [Mark]) -> Option<Symbol> {
            match marks[usize::from(symbol)] {
                Mark::Active => return Some(symbol),
                Mark::Done => return None,
                Mark::New => {}
            }
            marks[usize::from(symbol)] = Mark::Active;
            for &callee in &edges[usize::from(symbol)] {
                if let Some(cycle) = visit(callee, edges, marks) {
                    return Some(cycle);
                }
            }
            marks[usize::from(symbol)] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::New; rules.len()];
        (0..rules.len()).find_map(|symbol| visit(symbol as Symbol, &edges, &mut marks))
    }

    fn left_calls(&self, expr: &Expr, calls: &mut Vec<Symbol>) {
        match expr {
            Expr::Blank | Expr::Token(_) => {}
            Expr::Call(callee) => calls.push(*callee),
            Expr::Seq(items) => {
                for item in items {
                    self.left_calls(item, calls);
                    if !self.first_of(item).1 {
                        break;
                    }
                }
            }
            Expr::Choice(alternatives) => {
                for alternative in alternatives {
                    self.left_calls(alternative, calls);
                }
            }
            Expr::Repeat(inner)
            | Expr::Repeat1(inner)
            | Expr::Optional(inner)
            | Expr::Field(_, inner) => self.left_calls(inner, calls),
        }
    }
}

fn bodies(rules: &[Option<Expr>]) -> impl Iterator<Item = (Symbol, &Expr)> {
    rules.iter().enumerate().filter_map(|(symbol, rule)| Some((symbol as Symbol, rule.as_ref()?)))
}

fn walk(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Blank | Expr::Token(_) | Expr::Call(_) => {}
        Expr::Seq(items) | Expr::Choice(items) => {
            for item in items {
                walk(item, f);
            }
        }
        Expr::Repeat(inner) | Expr::Repeat1(inner) | Expr::Optional(inner) | Expr::Field(_, inner) => {
            walk(inner, f);
        }
    }
}
