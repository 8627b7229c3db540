use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::analysis::{Analysis, Expr};
use crate::lexicon::{Lexicon, TokenMatcher, TokenRule, anchored};
use crate::program::Program;
use crate::{
    ABI_VERSION, ERROR_SYMBOL, FieldId, GrammarError, Rule, Symbol, SymbolMetadata, SymbolSet,
    SymbolType, TokenPattern,
};

/// Read-only parse tables for one language.
///
/// Cloning is cheap and clones compare equal: equality is identity of the
/// underlying tables.
#[derive(Clone)]
pub struct Grammar(Arc<GrammarData>);

struct GrammarData {
    name: Box<str>,
    abi_version: u32,
    symbols: Box<[SymbolMetadata]>,
    error: SymbolMetadata,
    named_ids: FxHashMap<Box<str>, Symbol>,
    anonymous_ids: FxHashMap<Box<str>, Symbol>,
    fields: Box<[Box<str>]>,
    field_ids: FxHashMap<Box<str>, FieldId>,
    root: Symbol,
    lexicon: Lexicon,
    program: Program,
}

impl Grammar {
    pub fn builder(name: impl Into<Box<str>>) -> GrammarBuilder {
        GrammarBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn abi_version(&self) -> u32 {
        self.0.abi_version
    }

    /// Number of symbols, counting the end-of-input symbol but not `ERROR`.
    pub fn symbol_count(&self) -> usize {
        self.0.symbols.len()
    }

    pub fn field_count(&self) -> usize {
        self.0.fields.len()
    }

    pub fn root(&self) -> Symbol {
        self.0.root
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        if symbol == ERROR_SYMBOL {
            return Some(&self.0.error);
        }
        self.0.symbols.get(usize::from(symbol))
    }

    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        self.symbol_metadata(symbol).map(|metadata| &*metadata.name)
    }

    pub fn symbol_type(&self, symbol: Symbol) -> Option<SymbolType> {
        self.symbol_metadata(symbol).map(SymbolMetadata::symbol_type)
    }

    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named {
            if name == &*self.0.error.name {
                return Some(ERROR_SYMBOL);
            }
            self.0.named_ids.get(name).copied()
        } else {
            self.0.anonymous_ids.get(name).copied()
        }
    }

    pub fn field_name_for_id(&self, field: FieldId) -> Option<&str> {
        self.0.fields.get(usize::from(field.get()) - 1).map(|name| &**name)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.0.field_ids.get(name).copied()
    }

    /// Whether `symbol` is produced by the lexer rather than by a rule.
    pub fn is_token(&self, symbol: Symbol) -> bool {
        symbol != ERROR_SYMBOL && self.0.program.entry(symbol).is_none()
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.0.lexicon
    }

    pub fn program(&self) -> &Program {
        &self.0.program
    }
}

impl PartialEq for Grammar {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Grammar {}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("name", &self.0.name)
            .field("abi_version", &self.0.abi_version)
            .field("symbols", &self.0.symbols.len())
            .finish_non_exhaustive()
    }
}

enum Declaration {
    Token { name: Box<str>, pattern: TokenPattern },
    Rule { name: Box<str>, rule: Rule },
}

impl Declaration {
    fn name(&self) -> &str {
        match self {
            Declaration::Token { name, .. } | Declaration::Rule { name, .. } => name,
        }
    }
}

/// Collects tokens and rules, then validates and compiles them into a
/// [`Grammar`].
///
/// Symbols are numbered in declaration order starting at `1`, with tokens and
/// rules sharing one sequence. Anonymous tokens introduced by
/// [`Rule::literal`] follow, in order of first use.
pub struct GrammarBuilder {
    name: Box<str>,
    abi_version: u32,
    declarations: Vec<Declaration>,
    extras: Vec<Box<str>>,
    padding: Box<str>,
    root: Option<Box<str>>,
}

impl GrammarBuilder {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            abi_version: ABI_VERSION,
            declarations: Vec::new(),
            extras: Vec::new(),
            padding: r"\s+".into(),
            root: None,
        }
    }

    /// Declares a named token.
    #[must_use]
    pub fn token(mut self, name: impl Into<Box<str>>, pattern: TokenPattern) -> Self {
        self.declarations.push(Declaration::Token { name: name.into(), pattern });
        self
    }

    #[must_use]
    pub fn rule(mut self, name: impl Into<Box<str>>, rule: Rule) -> Self {
        self.declarations.push(Declaration::Rule { name: name.into(), rule });
        self
    }

    /// Marks a declared token as allowed between any two tokens.
    #[must_use]
    pub fn extra(mut self, name: impl Into<Box<str>>) -> Self {
        self.extras.push(name.into());
        self
    }

    /// Pattern for text skipped between tokens. Defaults to `\s+`.
    #[must_use]
    pub fn padding(mut self, pattern: impl Into<Box<str>>) -> Self {
        self.padding = pattern.into();
        self
    }

    /// The rule every parse starts from. Defaults to the first declared rule.
    #[must_use]
    pub fn root(mut self, name: impl Into<Box<str>>) -> Self {
        self.root = Some(name.into());
        self
    }

    #[must_use]
    pub fn abi_version(mut self, version: u32) -> Self {
        self.abi_version = version;
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        let GrammarBuilder { name, abi_version, declarations, extras, padding, root } = self;

        let mut symbols = vec![SymbolMetadata::new("end", false, false)];
        let mut named_ids = FxHashMap::default();
        for declaration in &declarations {
            let symbol = next_symbol(&symbols)?;
            let name = declaration.name();
            if named_ids.insert(Box::<str>::from(name), symbol).is_some() {
                return Err(GrammarError::DuplicateSymbol(name.into()));
            }
            symbols.push(match declaration {
                Declaration::Token { .. } => SymbolMetadata::new(name, true, true),
                Declaration::Rule { .. } => SymbolMetadata::new(name, true, !name.starts_with('_')),
            });
        }

        let mut anonymous_ids = FxHashMap::default();
        let mut fields = Vec::new();
        let mut field_ids = FxHashMap::default();
        for declaration in &declarations {
            let Declaration::Rule { rule, .. } = declaration else { continue };
            let mut result = Ok(());
            rule.walk(&mut |rule| match rule {
                Rule::Literal(text) if text.is_empty() => {
                    result = Err(GrammarError::EmptyToken("\"\"".into()));
                }
                Rule::Literal(text) if !anonymous_ids.contains_key(text) => {
                    match next_symbol(&symbols) {
                        Ok(symbol) => {
                            anonymous_ids.insert(text.clone(), symbol);
                            symbols.push(SymbolMetadata::new(text.clone(), false, true));
                        }
                        Err(err) => result = Err(err),
                    }
                }
                Rule::Field(field, _) if !field_ids.contains_key(field) => {
                    fields.push(field.clone());
                    let id = u16::try_from(fields.len()).ok().and_then(FieldId::new);
                    match id {
                        Some(id) => {
                            field_ids.insert(field.clone(), id);
                        }
                        None => {
                            result = Err(GrammarError::TooManySymbols { max: usize::from(u16::MAX) });
                        }
                    }
                }
                _ => {}
            });
            result?;
        }

        let mut is_rule = vec![false; symbols.len()];
        for declaration in &declarations {
            if let Declaration::Rule { name, .. } = declaration {
                is_rule[usize::from(named_ids[name])] = true;
            }
        }

        let mut tokens = Vec::new();
        let mut rules: Vec<Option<Expr>> = vec![None; symbols.len()];
        for declaration in &declarations {
            let symbol = named_ids[declaration.name()];
            match declaration {
                Declaration::Token { name, pattern } => {
                    tokens.push(TokenRule { symbol, matcher: compile_token(name, pattern)? });
                }
                Declaration::Rule { name, rule } => {
                    let resolver = Resolver {
                        rule: name,
                        is_rule: &is_rule,
                        named_ids: &named_ids,
                        anonymous_ids: &anonymous_ids,
                        field_ids: &field_ids,
                    };
                    rules[usize::from(symbol)] = Some(resolver.resolve(rule)?);
                }
            }
        }
        let mut literals: Vec<_> = anonymous_ids.iter().map(|(text, &symbol)| (symbol, text)).collect();
        literals.sort_unstable();
        for (symbol, text) in literals {
            tokens.push(TokenRule { symbol, matcher: TokenMatcher::Literal(text.clone()) });
        }

        let root = match root {
            Some(root) => root,
            None => declarations
                .iter()
                .find_map(|declaration| match declaration {
                    Declaration::Rule { name, .. } => Some(name.clone()),
                    Declaration::Token { .. } => None,
                })
                .ok_or(GrammarError::NoRules)?,
        };
        let root_symbol = match named_ids.get(&root) {
            Some(&symbol) if rules[usize::from(symbol)].is_some() => symbol,
            _ => return Err(GrammarError::InvalidRoot(root)),
        };

        let mut extra_set = SymbolSet::with_capacity(symbols.len());
        for extra in extras {
            match named_ids.get(&extra) {
                Some(&symbol) if rules[usize::from(symbol)].is_none() => {
                    extra_set.insert(symbol);
                }
                _ => return Err(GrammarError::InvalidExtra(extra)),
            }
        }

        let padding = anchored(&padding)
            .map_err(|source| GrammarError::InvalidPattern { name: "padding".into(), source })?;

        let analysis = Analysis::new(&rules, root_symbol);
        if let Some(symbol) = analysis.nullable_repetition(&rules) {
            return Err(GrammarError::NullableRepetition(symbols[usize::from(symbol)].name.clone()));
        }
        if let Some(symbol) = analysis.left_recursion(&rules) {
            return Err(GrammarError::LeftRecursion(symbols[usize::from(symbol)].name.clone()));
        }
        let program = Program::lower(&rules, &analysis);

        tracing::debug!(
            grammar = %name,
            symbols = symbols.len(),
            fields = fields.len(),
            instructions = program.instructions().len(),
            "built grammar"
        );

        Ok(Grammar(Arc::new(GrammarData {
            name,
            abi_version,
            symbols: symbols.into_boxed_slice(),
            error: SymbolMetadata::new("ERROR", true, true),
            named_ids,
            anonymous_ids,
            fields: fields.into_boxed_slice(),
            field_ids,
            root: root_symbol,
            lexicon: Lexicon { tokens: tokens.into_boxed_slice(), padding, extras: extra_set },
            program,
        })))
    }
}

fn next_symbol(symbols: &[SymbolMetadata]) -> Result<Symbol, GrammarError> {
    Symbol::try_from(symbols.len())
        .ok()
        .filter(|&symbol| symbol != ERROR_SYMBOL)
        .ok_or(GrammarError::TooManySymbols { max: usize::from(ERROR_SYMBOL) })
}

fn compile_token(name: &str, pattern: &TokenPattern) -> Result<TokenMatcher, GrammarError> {
    match pattern {
        TokenPattern::Literal(text) if text.is_empty() => Err(GrammarError::EmptyToken(name.into())),
        TokenPattern::Literal(text) => Ok(TokenMatcher::Literal(text.clone())),
        TokenPattern::Regex(pattern) => {
            let regex = anchored(pattern)
                .map_err(|source| GrammarError::InvalidPattern { name: name.into(), source })?;
            if regex.is_match("") {
                return Err(GrammarError::EmptyToken(name.into()));
            }
            Ok(TokenMatcher::Regex(regex))
        }
    }
}

struct Resolver<'a> {
    rule: &'a str,
    is_rule: &'a [bool],
    named_ids: &'a FxHashMap<Box<str>, Symbol>,
    anonymous_ids: &'a FxHashMap<Box<str>, Symbol>,
    field_ids: &'a FxHashMap<Box<str>, FieldId>,
}

impl Resolver<'_> {
    fn resolve(&self, rule: &Rule) -> Result<Expr, GrammarError> {
        Ok(match rule {
            Rule::Blank => Expr::Blank,
            Rule::Symbol(name) => {
                let &symbol = self.named_ids.get(name).ok_or_else(|| GrammarError::UnknownSymbol {
                    rule: self.rule.into(),
                    name: name.clone(),
                })?;
                if self.is_rule[usize::from(symbol)] {
                    Expr::Call(symbol)
                } else {
                    Expr::Token(symbol)
                }
            }
            Rule::Literal(text) => Expr::Token(self.anonymous_ids[text]),
            Rule::Seq(rules) => Expr::Seq(self.resolve_all(rules)?),
            Rule::Choice(rules) => Expr::Choice(self.resolve_all(rules)?),
            Rule::Repeat(rule) => Expr::Repeat(Box::new(self.resolve(rule)?)),
            Rule::Repeat1(rule) => Expr::Repeat1(Box::new(self.resolve(rule)?)),
            Rule::Optional(rule) => Expr::Optional(Box::new(self.resolve(rule)?)),
            Rule::Field(name, rule) => Expr::Field(self.field_ids[name], Box::new(self.resolve(rule)?)),
        })
    }

    fn resolve_all(&self, rules: &[Rule]) -> Result<Vec<Expr>, GrammarError> {
        rules.iter().map(|rule| self.resolve(rule)).collect()
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::{END_SYMBOL, Instruction};

    fn arithmetic() -> GrammarBuilder {
        Grammar::builder("arithmetic")
            .token("number", TokenPattern::regex("[0-9]+"))
            .token("plus", TokenPattern::literal("+"))
            .rule(
                "sum",
                Rule::seq([
                    Rule::field("left", Rule::sym("number")),
                    Rule::sym("plus"),
                    Rule::field("right", Rule::sym("number")),
                ]),
            )
    }

    #[test]
    fn symbols_follow_declaration_order() {
        let grammar = arithmetic().build().unwrap();

        assert_eq!(grammar.symbol_count(), 4);
        assert_eq!(grammar.symbol_for_name("number", true), Some(1));
        assert_eq!(grammar.symbol_for_name("plus", true), Some(2));
        assert_eq!(grammar.symbol_for_name("sum", true), Some(3));
        assert_eq!(grammar.symbol_for_name("sum", false), None);
        assert_eq!(grammar.symbol_for_name("ERROR", true), Some(ERROR_SYMBOL));
        assert_eq!(grammar.symbol_name(END_SYMBOL), Some("end"));
        assert_eq!(grammar.symbol_name(ERROR_SYMBOL), Some("ERROR"));
        assert_eq!(grammar.symbol_name(42), None);
        assert_eq!(grammar.symbol_type(1), Some(SymbolType::Regular));
        assert_eq!(grammar.symbol_type(END_SYMBOL), Some(SymbolType::Auxiliary));
        assert_eq!(grammar.root(), 3);
        assert!(grammar.is_token(1));
        assert!(!grammar.is_token(3));
        assert!(!grammar.is_token(ERROR_SYMBOL));
    }

    #[test]
    fn fields_are_numbered_from_one() {
        let grammar = arithmetic().build().unwrap();

        assert_eq!(grammar.field_count(), 2);
        let left = grammar.field_id_for_name("left").unwrap();
        assert_eq!(left.get(), 1);
        assert_eq!(grammar.field_name_for_id(left), Some("left"));
        assert_eq!(grammar.field_id_for_name("middle"), None);
    }

    #[test]
    fn literals_become_anonymous_symbols() {
        let grammar = Grammar::builder("call")
            .token("identifier", TokenPattern::regex("[a-z]+"))
            .rule(
                "call",
                Rule::seq([Rule::sym("identifier"), Rule::literal("("), Rule::literal(")")]),
            )
            .rule("_hidden", Rule::literal("("))
            .build()
            .unwrap();

        assert_eq!(grammar.symbol_for_name("(", false), Some(4));
        assert_eq!(grammar.symbol_for_name(")", false), Some(5));
        assert_eq!(grammar.symbol_type(4), Some(SymbolType::Anonymous));
        assert_eq!(grammar.symbol_type(3), Some(SymbolType::Auxiliary));
        assert_eq!(grammar.lexicon().tokens().len(), 3);
    }

    #[test]
    fn repetitions_get_recovery_points() {
        let grammar = Grammar::builder("list")
            .token("item", TokenPattern::regex("[a-z]+"))
            .rule("list", Rule::repeat(Rule::sym("item")))
            .build()
            .unwrap();
        let program = grammar.program();
        let entry = program.entry(2).unwrap();

        assert!(matches!(program.instruction(entry), Instruction::Choice { .. }));
        assert!(matches!(program.instruction(entry + 1), Instruction::Token { symbol: 1, repair: None }));
        assert_eq!(program.instruction(entry + 2), Instruction::Commit { target: entry });
        let Instruction::Recover { first, sync, resume } = program.instruction(entry + 3) else {
            panic!("expected a recovery point");
        };
        assert_eq!(resume, entry);
        assert!(program.set(first).contains(1));
        assert!(program.set(sync).contains(END_SYMBOL));
        assert_eq!(program.instruction(entry + 4), Instruction::Return);
    }

    #[test]
    fn tokens_after_consumed_input_are_repairable() {
        let grammar = Grammar::builder("parens")
            .token("number", TokenPattern::regex("[0-9]+"))
            .rule("group", Rule::seq([Rule::literal("("), Rule::sym("number"), Rule::literal(")")]))
            .build()
            .unwrap();
        let program = grammar.program();
        let entry = program.entry(2).unwrap();

        assert!(matches!(program.instruction(entry), Instruction::Token { symbol: 3, repair: None }));
        assert!(matches!(
            program.instruction(entry + 1),
            Instruction::Token { symbol: 1, repair: Some(_) }
        ));
        let Instruction::Token { symbol: 4, repair: Some(set) } = program.instruction(entry + 2)
        else {
            panic!("`)` should be repairable");
        };
        assert!(program.set(set).contains(END_SYMBOL));
    }

    #[test]
    fn rejects_invalid_grammars() {
        let errors = [
            Grammar::builder("empty").build(),
            Grammar::builder("dup")
                .token("a", TokenPattern::literal("a"))
                .rule("a", Rule::Blank)
                .build(),
            Grammar::builder("unknown").rule("a", Rule::sym("b")).build(),
            Grammar::builder("left")
                .token("x", TokenPattern::literal("x"))
                .rule("a", Rule::seq([Rule::optional(Rule::sym("x")), Rule::sym("a")]))
                .build(),
            Grammar::builder("nullable")
                .rule("a", Rule::repeat(Rule::optional(Rule::literal("x"))))
                .build(),
            Grammar::builder("empty-token")
                .token("x", TokenPattern::regex("x*"))
                .rule("a", Rule::sym("x"))
                .build(),
            Grammar::builder("bad-pattern")
                .token("x", TokenPattern::regex("("))
                .rule("a", Rule::sym("x"))
                .build(),
            Grammar::builder("bad-extra")
                .rule("a", Rule::literal("x"))
                .extra("a")
                .build(),
            Grammar::builder("bad-root")
                .token("x", TokenPattern::literal("x"))
                .rule("a", Rule::sym("x"))
                .root("x")
                .build(),
        ];
        let messages = errors
            .into_iter()
            .map(|result| result.map_or_else(|err| err.to_string(), |_| "ok".to_owned()))
            .collect::<Vec<_>>()
            .join("\n");

        expect![[r#"
            grammar has no rules
            symbol `a` is declared more than once
            rule `a` refers to undeclared symbol `b`
            rule `a` is left-recursive
            rule `a` repeats something that can match empty
            token `x` can match the empty string
            invalid pattern for token `x`
            extra `a` must be a declared token
            root `x` must be a rule, not a token"#]]
        .assert_eq(&messages);
    }

    #[test]
    fn grammars_compare_by_identity() {
        let a = arithmetic().build().unwrap();
        let b = arithmetic().build().unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
