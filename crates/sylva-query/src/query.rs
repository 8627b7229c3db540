use sylva_grammar::{ABI_VERSION, Grammar, MIN_COMPATIBLE_ABI_VERSION};

use crate::error::{QueryError, QueryErrorKind};
use crate::parser;
use crate::pattern::{CaptureQuantifier, Pattern, Step};
use crate::predicate::{PredicateStep, QueryPredicate};

/// A compiled set of patterns for one grammar.
#[derive(Debug)]
pub struct Query {
    grammar: Grammar,
    patterns: Vec<Pattern>,
    capture_names: Vec<Box<str>>,
    disabled_captures: Vec<bool>,
    strings: Vec<Box<str>>,
    steps: Vec<Step>,
}

impl Query {
    pub fn new(grammar: &Grammar, source: &str) -> Result<Self, QueryError> {
        let version = grammar.abi_version();
        if !(MIN_COMPATIBLE_ABI_VERSION..=ABI_VERSION).contains(&version) {
            return Err(QueryError::new(
                QueryErrorKind::Language,
                source,
                0,
                format!("grammar `{}` has ABI version {version}", grammar.name()),
            ));
        }

        let compiled = parser::compile(grammar, source)?;
        tracing::debug!(
            grammar = grammar.name(),
            patterns = compiled.patterns.len(),
            captures = compiled.capture_names.len(),
            "compiled query"
        );
        Ok(Self {
            grammar: grammar.clone(),
            disabled_captures: vec![false; compiled.capture_names.len()],
            patterns: compiled.patterns,
            capture_names: compiled.capture_names,
            strings: compiled.strings,
            steps: compiled.steps,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn capture_names(&self) -> &[Box<str>] {
        &self.capture_names
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names.iter().position(|candidate| &**candidate == name).map(|index| index as u32)
    }

    /// Quantifiers of every capture in one pattern, indexed by capture id.
    /// Captures first named by later patterns are left out.
    pub fn capture_quantifiers(&self, pattern: usize) -> &[CaptureQuantifier] {
        self.patterns.get(pattern).map_or(&[], |pattern| &pattern.capture_quantifiers)
    }

    pub fn capture_quantifier(&self, pattern: usize, capture: u32) -> CaptureQuantifier {
        self.capture_quantifiers(pattern).get(capture as usize).copied().unwrap_or_default()
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn string_value(&self, id: u32) -> Option<&str> {
        self.strings.get(id as usize).map(|string| &**string)
    }

    /// Byte offset of a pattern in the query source.
    pub fn start_byte_for_pattern(&self, pattern: usize) -> Option<usize> {
        self.patterns.get(pattern).map(|pattern| pattern.start_byte)
    }

    pub fn is_pattern_rooted(&self, pattern: usize) -> bool {
        self.patterns.get(pattern).is_some_and(Pattern::is_rooted)
    }

    pub fn is_pattern_non_local(&self, pattern: usize) -> bool {
        self.patterns.get(pattern).is_some_and(Pattern::is_non_local)
    }

    /// Number of node patterns in the query, numbered in source order.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether a match that got as far as `step` is certain to complete:
    /// every later node pattern of the same pattern is optional.
    pub fn is_pattern_guaranteed_at_step(&self, step: usize) -> bool {
        let Some(current) = self.steps.get(step) else {
            return false;
        };
        let end = self.patterns[current.pattern].steps.end;
        !self.steps[step + 1..end].iter().any(|later| later.required)
    }

    pub fn predicates_for_pattern(&self, pattern: usize) -> &[PredicateStep] {
        self.patterns.get(pattern).map_or(&[], |pattern| &pattern.predicate_steps)
    }

    pub fn general_predicates(&self, pattern: usize) -> &[QueryPredicate] {
        self.patterns.get(pattern).map_or(&[], |pattern| &pattern.predicates)
    }

    /// Stops reporting a capture. Its patterns still match.
    pub fn disable_capture(&mut self, name: &str) {
        if let Some(index) = self.capture_index_for_name(name) {
            self.disabled_captures[index as usize] = true;
        }
    }

    pub fn disable_pattern(&mut self, pattern: usize) {
        if let Some(pattern) = self.patterns.get_mut(pattern) {
            pattern.disabled = true;
        }
    }

    pub(crate) fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub(crate) fn is_capture_disabled(&self, capture: u32) -> bool {
        self.disabled_captures[capture as usize]
    }
}
