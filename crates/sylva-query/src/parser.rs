//! Reads query source into compiled patterns.
//!
//! Parsing and name resolution happen in one pass, so every error carries
//! the offset of the text that caused it.

use rustc_hash::FxHashMap;
use sylva_grammar::{FieldId, Grammar, SymbolType};

use crate::error::{QueryError, QueryErrorKind};
use crate::pattern::{
    Capture, CaptureQuantifier, Element, ElementKind, Item, NodeTest, Pattern, Quantifier, Step,
};
use crate::predicate::{PredicateStep, QueryPredicate, QueryPredicateArg};

/// Everything a query source compiles to.
pub(crate) struct Compiled {
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) capture_names: Vec<Box<str>>,
    pub(crate) strings: Vec<Box<str>>,
    pub(crate) steps: Vec<Step>,
}

pub(crate) fn compile(grammar: &Grammar, source: &str) -> Result<Compiled, QueryError> {
    let mut parser = QueryParser {
        grammar,
        source,
        pos: 0,
        capture_names: Vec::new(),
        capture_ids: FxHashMap::default(),
        strings: Vec::new(),
        string_ids: FxHashMap::default(),
        steps: Vec::new(),
        predicate_steps: Vec::new(),
        predicates: Vec::new(),
    };
    let mut patterns = Vec::new();
    loop {
        parser.skip_trivia();
        if parser.at_end() {
            break;
        }
        let pattern = parser.pattern(patterns.len())?;
        patterns.push(pattern);
    }
    Ok(Compiled {
        patterns,
        capture_names: parser.capture_names,
        strings: parser.strings,
        steps: parser.steps,
    })
}

struct QueryParser<'a> {
    grammar: &'a Grammar,
    source: &'a str,
    pos: usize,
    capture_names: Vec<Box<str>>,
    capture_ids: FxHashMap<Box<str>, u32>,
    strings: Vec<Box<str>>,
    string_ids: FxHashMap<Box<str>, u32>,
    steps: Vec<Step>,
    /// Predicates of the pattern being parsed.
    predicate_steps: Vec<PredicateStep>,
    predicates: Vec<QueryPredicate>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_capture_char(c: char) -> bool {
    is_name_char(c) || matches!(c, '-' | '.')
}

fn is_predicate_char(c: char) -> bool {
    is_capture_char(c) || matches!(c, '?' | '!')
}

impl<'a> QueryParser<'a> {
    fn pattern(&mut self, index: usize) -> Result<Pattern, QueryError> {
        let start_byte = self.pos;
        let first_step = self.steps.len();
        let element = self.element(index)?;
        if element.field.is_some() {
            return Err(self.error_at(QueryErrorKind::Structure, start_byte, "a top-level pattern cannot have a field"));
        }
        let items = match element.kind {
            ElementKind::Group(items) if element.quantifier == Quantifier::One => items,
            kind => vec![Item::Element(Element { kind, ..element })],
        };

        let capture_quantifiers = sequence_quantifiers(&items, self.capture_names.len());
        tracing::trace!(index, start_byte, "compiled pattern");
        Ok(Pattern {
            items,
            start_byte,
            predicate_steps: std::mem::take(&mut self.predicate_steps),
            predicates: std::mem::take(&mut self.predicates),
            capture_quantifiers,
            steps: first_step..self.steps.len(),
            disabled: false,
        })
    }

    fn element(&mut self, pattern: usize) -> Result<Element, QueryError> {
        self.skip_trivia();
        let field = self.field_prefix()?;
        let start = self.pos;
        let first_step = self.steps.len();

        let kind = match self.peek() {
            Some('(') => self.parenthesized(pattern)?,
            Some('[') => self.alternation(pattern)?,
            Some('"') => {
                let text = self.string()?;
                let Some(symbol) = self.grammar.symbol_for_name(&text, false) else {
                    return Err(self.error_at(QueryErrorKind::NodeType, start, format!("unknown node type \"{text}\"")));
                };
                self.step(pattern);
                ElementKind::Node { test: NodeTest::Symbol(symbol), children: Vec::new(), negated_fields: Vec::new() }
            }
            Some('_') if !self.peek_nth(1).is_some_and(is_name_char) => {
                self.bump();
                self.step(pattern);
                ElementKind::Node {
                    test: NodeTest::Any { named_only: false },
                    children: Vec::new(),
                    negated_fields: Vec::new(),
                }
            }
            Some(c) => return Err(self.error(QueryErrorKind::Syntax, format!("unexpected `{c}`"))),
            None => return Err(self.error(QueryErrorKind::Syntax, "unexpected end of query")),
        };

        self.skip_trivia();
        let quantifier = match self.peek() {
            Some('?') => Quantifier::ZeroOrOne,
            Some('*') => Quantifier::ZeroOrMore,
            Some('+') => Quantifier::OneOrMore,
            _ => Quantifier::One,
        };
        if quantifier != Quantifier::One {
            self.bump();
            if quantifier.bounds().0 == 0 {
                for step in &mut self.steps[first_step..] {
                    step.required = false;
                }
            }
        }

        let mut captures = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek() != Some('@') {
                break;
            }
            let order = self.pos as u32;
            self.bump();
            let name = self.take_while(is_capture_char);
            if name.is_empty() {
                return Err(self.error(QueryErrorKind::Syntax, "expected a capture name after `@`"));
            }
            captures.push(Capture { id: self.intern_capture(name), order });
        }

        match kind {
            ElementKind::Group(_) if !captures.is_empty() || field.is_some() => {
                Err(self.error_at(QueryErrorKind::Structure, start, "a group cannot have a field or a capture"))
            }
            ElementKind::Alternation(alternatives) => {
                let alternatives = alternatives
                    .into_iter()
                    .map(|mut alternative| {
                        if matches!(alternative.kind, ElementKind::Group(_)) && !captures.is_empty() {
                            return Err(self.error_at(
                                QueryErrorKind::Structure,
                                start,
                                "a group cannot have a field or a capture",
                            ));
                        }
                        alternative.field = alternative.field.or(field);
                        alternative.captures.extend(captures.iter().cloned());
                        Ok(alternative)
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Element { kind: ElementKind::Alternation(alternatives), field: None, quantifier, captures: Vec::new() })
            }
            kind => Ok(Element { kind, field, quantifier, captures }),
        }
    }

    /// `name:` in front of a pattern.
    fn field_prefix(&mut self) -> Result<Option<FieldId>, QueryError> {
        let start = self.pos;
        let name = self.take_while(is_name_char);
        if name.is_empty() || name == "_" {
            self.pos = start;
            return Ok(None);
        }
        self.skip_trivia();
        if self.peek() != Some(':') {
            self.pos = start;
            return Err(self.error(QueryErrorKind::Syntax, format!("unexpected `{name}`")));
        }
        self.bump();
        self.skip_trivia();
        match self.grammar.field_id_for_name(name) {
            Some(field) => Ok(Some(field)),
            None => Err(self.error_at(QueryErrorKind::Field, start, format!("unknown field `{name}`"))),
        }
    }

    /// Whatever follows `(`: a node pattern or a group of sibling patterns.
    fn parenthesized(&mut self, pattern: usize) -> Result<ElementKind, QueryError> {
        let open = self.pos;
        self.bump();
        self.skip_trivia();
        match self.peek() {
            Some('(' | '[' | '"' | '.') => {
                let items = self.items(pattern, open, None)?;
                if !items.iter().any(|item| matches!(item, Item::Element(_))) {
                    return Err(self.error_at(QueryErrorKind::Syntax, open, "empty group"));
                }
                Ok(ElementKind::Group(items))
            }
            Some(')') => Err(self.error(QueryErrorKind::Syntax, "empty pattern")),
            Some('_') if !self.peek_nth(1).is_some_and(is_name_char) => {
                self.bump();
                self.step(pattern);
                self.node_children(pattern, open, NodeTest::Any { named_only: true })
            }
            Some(c) if is_name_char(c) => {
                let name_start = self.pos;
                let name = self.take_while(is_name_char);
                self.skip_trivia();
                if self.peek() == Some(':') {
                    // `(field: pattern ...)` is a group whose first member has a field.
                    self.pos = name_start;
                    let items = self.items(pattern, open, None)?;
                    return Ok(ElementKind::Group(items));
                }
                let test = match name {
                    "ERROR" => NodeTest::Error,
                    "MISSING" => self.missing()?,
                    _ => {
                        let symbol = self
                            .grammar
                            .symbol_for_name(name, true)
                            .filter(|&symbol| self.grammar.symbol_type(symbol) != Some(SymbolType::Auxiliary));
                        let Some(symbol) = symbol else {
                            return Err(self.error_at(
                                QueryErrorKind::NodeType,
                                name_start,
                                format!("unknown node type `{name}`"),
                            ));
                        };
                        NodeTest::Symbol(symbol)
                    }
                };
                self.step(pattern);
                let kind = self.node_children(pattern, open, test)?;
                if let ElementKind::Node { test: NodeTest::Symbol(symbol), children, .. } = &kind {
                    if self.grammar.is_token(*symbol) && !children.is_empty() {
                        return Err(self.error_at(
                            QueryErrorKind::Structure,
                            name_start,
                            format!("`{name}` is a token and has no children"),
                        ));
                    }
                }
                Ok(kind)
            }
            Some(c) => Err(self.error(QueryErrorKind::Syntax, format!("unexpected `{c}`"))),
            None => Err(self.error_at(QueryErrorKind::Syntax, open, "unclosed `(`")),
        }
    }

    /// The optional kind after `(MISSING`.
    fn missing(&mut self) -> Result<NodeTest, QueryError> {
        self.skip_trivia();
        let start = self.pos;
        let (name, named) = match self.peek() {
            Some('"') => (self.string()?, false),
            Some(c) if is_name_char(c) => (self.take_while(is_name_char).to_owned(), true),
            _ => return Ok(NodeTest::Missing(None)),
        };
        match self.grammar.symbol_for_name(&name, named) {
            Some(symbol) if self.grammar.is_token(symbol) => Ok(NodeTest::Missing(Some(symbol))),
            _ => Err(self.error_at(QueryErrorKind::NodeType, start, format!("unknown token `{name}`"))),
        }
    }

    fn node_children(&mut self, pattern: usize, open: usize, test: NodeTest) -> Result<ElementKind, QueryError> {
        let mut negated_fields = Vec::new();
        let children = self.items(pattern, open, Some(&mut negated_fields))?;
        Ok(ElementKind::Node { test, children, negated_fields })
    }

    /// Child patterns, anchors, negated fields and predicates up to the
    /// closing `)`.
    fn items(
        &mut self,
        pattern: usize,
        open: usize,
        mut negated_fields: Option<&mut Vec<FieldId>>,
    ) -> Result<Vec<Item>, QueryError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error_at(QueryErrorKind::Syntax, open, "unclosed `(`")),
                Some(')') => {
                    self.bump();
                    return Ok(items);
                }
                Some('.') => {
                    self.bump();
                    items.push(Item::Anchor);
                }
                Some('!') => {
                    let start = self.pos;
                    self.bump();
                    let name = self.take_while(is_name_char);
                    let Some(negated) = negated_fields.as_deref_mut() else {
                        return Err(self.error_at(QueryErrorKind::Syntax, start, "negated field outside a node"));
                    };
                    match self.grammar.field_id_for_name(name) {
                        Some(field) => negated.push(field),
                        None => {
                            return Err(self.error_at(QueryErrorKind::Field, start + 1, format!("unknown field `{name}`")));
                        }
                    }
                }
                Some('(') if self.peek_nth(1) == Some('#') => self.predicate()?,
                Some(_) => items.push(Item::Element(self.element(pattern)?)),
            }
        }
    }

    fn alternation(&mut self, pattern: usize) -> Result<ElementKind, QueryError> {
        let open = self.pos;
        let first_step = self.steps.len();
        self.bump();
        let mut alternatives = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error_at(QueryErrorKind::Syntax, open, "unclosed `[`")),
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(_) => alternatives.push(self.element(pattern)?),
            }
        }
        if alternatives.is_empty() {
            return Err(self.error_at(QueryErrorKind::Syntax, open, "empty alternation"));
        }
        if alternatives.len() > 1 {
            for step in &mut self.steps[first_step..] {
                step.required = false;
            }
        }
        Ok(ElementKind::Alternation(alternatives))
    }

    /// `(#name? arg...)`, recorded for the current pattern.
    fn predicate(&mut self) -> Result<(), QueryError> {
        let open = self.pos;
        self.bump();
        self.bump();
        let operator = self.take_while(is_predicate_char);
        if !operator.ends_with(['?', '!']) || operator.len() < 2 {
            return Err(self.error_at(
                QueryErrorKind::Syntax,
                open + 1,
                format!("predicate `#{operator}` must end in `?` or `!`"),
            ));
        }
        let operator: Box<str> = operator.into();
        let mut steps = vec![PredicateStep::String(self.intern_string(&operator))];
        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error_at(QueryErrorKind::Syntax, open, "unclosed predicate")),
                Some(')') => {
                    self.bump();
                    break;
                }
                Some('@') => {
                    let start = self.pos;
                    self.bump();
                    let name = self.take_while(is_capture_char);
                    let Some(&id) = self.capture_ids.get(name) else {
                        return Err(self.error_at(QueryErrorKind::Capture, start, format!("unknown capture `@{name}`")));
                    };
                    steps.push(PredicateStep::Capture(id));
                    args.push(QueryPredicateArg::Capture(id));
                }
                Some(c) => {
                    let text = if c == '"' {
                        self.string()?
                    } else {
                        let text = self.take_while(is_predicate_char);
                        if text.is_empty() {
                            return Err(self.error(QueryErrorKind::Syntax, format!("unexpected `{c}`")));
                        }
                        text.to_owned()
                    };
                    steps.push(PredicateStep::String(self.intern_string(&text)));
                    args.push(QueryPredicateArg::String(text.into()));
                }
            }
        }
        steps.push(PredicateStep::Done);
        self.predicate_steps.extend(steps);
        self.predicates.push(QueryPredicate { operator, args });
        Ok(())
    }

    /// A double-quoted string with `\n`, `\t`, `\r`, `\0`, `\\` and `\"`
    /// escapes.
    fn string(&mut self) -> Result<String, QueryError> {
        let open = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error_at(QueryErrorKind::Syntax, open, "unterminated string")),
                Some('"') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some(c) => text.push(c),
                    None => return Err(self.error_at(QueryErrorKind::Syntax, open, "unterminated string")),
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn step(&mut self, pattern: usize) {
        self.steps.push(Step { pattern, required: true });
    }

    fn intern_capture(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.capture_ids.get(name) {
            return id;
        }
        let id = self.capture_names.len() as u32;
        self.capture_names.push(name.into());
        self.capture_ids.insert(name.into(), id);
        id
    }

    fn intern_string(&mut self, text: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(text) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(text.into());
        self.string_ids.insert(text.into(), id);
        id
    }

    /// Skips whitespace and `;` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some(';') => {
                    self.take_while(|c| c != '\n');
                }
                _ => return,
            }
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
        &self.source[start..self.pos]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, kind: QueryErrorKind, message: impl Into<String>) -> QueryError {
        self.error_at(kind, self.pos, message)
    }

    fn error_at(&self, kind: QueryErrorKind, offset: usize, message: impl Into<String>) -> QueryError {
        QueryError::new(kind, self.source, offset, message.into())
    }
}

fn sequence_quantifiers(items: &[Item], captures: usize) -> Vec<CaptureQuantifier> {
    let mut total = vec![CaptureQuantifier::Zero; captures];
    for item in items {
        if let Item::Element(element) = item {
            for (total, quantifier) in total.iter_mut().zip(element_quantifiers(element, captures)) {
                *total = total.then(quantifier);
            }
        }
    }
    total
}

fn element_quantifiers(element: &Element, captures: usize) -> Vec<CaptureQuantifier> {
    let mut quantifiers = match &element.kind {
        ElementKind::Node { children, .. } => sequence_quantifiers(children, captures),
        ElementKind::Group(items) => sequence_quantifiers(items, captures),
        ElementKind::Alternation(alternatives) => alternatives
            .iter()
            .map(|alternative| element_quantifiers(alternative, captures))
            .reduce(|left, right| left.into_iter().zip(right).map(|(l, r)| l.or(r)).collect())
            .unwrap_or_else(|| vec![CaptureQuantifier::Zero; captures]),
    };
    for capture in &element.captures {
        let slot = &mut quantifiers[capture.id as usize];
        *slot = slot.then(CaptureQuantifier::One);
    }
    for quantifier in &mut quantifiers {
        *quantifier = quantifier.repeat(element.quantifier);
    }
    quantifiers
}
