//! Compiled pattern trees, with every name resolved against the grammar.

use sylva_grammar::{FieldId, Symbol};

use crate::predicate::{PredicateStep, QueryPredicate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    pub(crate) fn bounds(self) -> (usize, usize) {
        match self {
            Self::One => (1, 1),
            Self::ZeroOrOne => (0, 1),
            Self::ZeroOrMore => (0, usize::MAX),
            Self::OneOrMore => (1, usize::MAX),
        }
    }
}

/// Which nodes a single-node pattern accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NodeTest {
    /// `_` when `named_only` is false, `(_)` otherwise.
    Any { named_only: bool },
    Symbol(Symbol),
    Error,
    Missing(Option<Symbol>),
}

#[derive(Clone, Debug)]
pub(crate) enum ElementKind {
    Node { test: NodeTest, children: Vec<Item>, negated_fields: Vec<FieldId> },
    /// Consecutive siblings, written `((a) (b))`.
    Group(Vec<Item>),
    Alternation(Vec<Element>),
}

#[derive(Clone, Debug)]
pub(crate) struct Capture {
    pub(crate) id: u32,
    /// Source offset of the `@`, which orders captures within a match.
    pub(crate) order: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct Element {
    pub(crate) kind: ElementKind,
    pub(crate) field: Option<FieldId>,
    pub(crate) quantifier: Quantifier,
    pub(crate) captures: Vec<Capture>,
}

#[derive(Clone, Debug)]
pub(crate) enum Item {
    Element(Element),
    /// `.`: the neighbouring patterns match adjacent named siblings.
    Anchor,
}

/// One node pattern in source order, the unit the step-level metadata is
/// reported on.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Step {
    pub(crate) pattern: usize,
    /// Whether every match has to pass this step.
    pub(crate) required: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    /// Top-level siblings; the first one matches the node a match starts at.
    pub(crate) items: Vec<Item>,
    pub(crate) start_byte: usize,
    pub(crate) predicate_steps: Vec<PredicateStep>,
    pub(crate) predicates: Vec<QueryPredicate>,
    pub(crate) capture_quantifiers: Vec<CaptureQuantifier>,
    pub(crate) steps: std::ops::Range<usize>,
    pub(crate) disabled: bool,
}

impl Pattern {
    /// A single node pattern that matches exactly once.
    pub(crate) fn is_rooted(&self) -> bool {
        match self.items.as_slice() {
            [Item::Element(element)] => {
                element.quantifier == Quantifier::One
                    && !matches!(element.kind, ElementKind::Group(_))
            }
            _ => false,
        }
    }

    /// Matching relates several top-level siblings to each other.
    pub(crate) fn is_non_local(&self) -> bool {
        let mut elements = self.items.iter().filter_map(|item| match item {
            Item::Element(element) => Some(element),
            Item::Anchor => None,
        });
        match (elements.next(), elements.next()) {
            (Some(_), Some(_)) => true,
            (Some(element), None) => {
                element.quantifier != Quantifier::One || matches!(element.kind, ElementKind::Group(_))
            }
            _ => false,
        }
    }
}

/// How many nodes a capture can hold in one match of a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CaptureQuantifier {
    #[default]
    Zero,
    ZeroOrOne,
    ZeroOrMore,
    One,
    OneOrMore,
}

/// Upper bound on a capture count; `Many` means more than one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Max {
    Zero,
    One,
    Many,
}

impl CaptureQuantifier {
    fn bounds(self) -> (bool, Max) {
        match self {
            Self::Zero => (false, Max::Zero),
            Self::ZeroOrOne => (false, Max::One),
            Self::ZeroOrMore => (false, Max::Many),
            Self::One => (true, Max::One),
            Self::OneOrMore => (true, Max::Many),
        }
    }

    fn from_bounds(required: bool, max: Max) -> Self {
        match (required, max) {
            (_, Max::Zero) => Self::Zero,
            (false, Max::One) => Self::ZeroOrOne,
            (false, Max::Many) => Self::ZeroOrMore,
            (true, Max::One) => Self::One,
            (true, Max::Many) => Self::OneOrMore,
        }
    }

    /// Occurrences of the capture in sequence.
    pub(crate) fn then(self, other: Self) -> Self {
        let (a_required, a_max) = self.bounds();
        let (b_required, b_max) = other.bounds();
        let max = match (a_max, b_max) {
            (Max::Zero, max) | (max, Max::Zero) => max,
            _ => Max::Many,
        };
        Self::from_bounds(a_required || b_required, max)
    }

    /// Occurrences of the capture in alternative branches.
    pub(crate) fn or(self, other: Self) -> Self {
        let (a_required, a_max) = self.bounds();
        let (b_required, b_max) = other.bounds();
        Self::from_bounds(a_required && b_required, a_max.max(b_max))
    }

    /// The capture inside a quantified pattern.
    pub(crate) fn repeat(self, quantifier: Quantifier) -> Self {
        let (required, max) = self.bounds();
        match quantifier {
            Quantifier::One => self,
            Quantifier::ZeroOrOne => Self::from_bounds(false, max),
            Quantifier::ZeroOrMore => Self::from_bounds(false, max_many(max)),
            Quantifier::OneOrMore => Self::from_bounds(required, max_many(max)),
        }
    }
}

fn max_many(max: Max) -> Max {
    if max == Max::Zero { Max::Zero } else { Max::Many }
}
