//! The rule language used to describe a grammar's syntactic structure.

/// A grammar rule body.
///
/// Rules reference other rules and named tokens by name, and introduce
/// anonymous tokens through [`Rule::literal`]. Rules whose name starts with an
/// underscore are hidden: their nodes never appear in trees and their children
/// are spliced into the enclosing node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Matches nothing, always succeeds.
    Blank,
    /// A reference to a rule or a named token.
    Symbol(Box<str>),
    /// An anonymous token matching exactly this text.
    Literal(Box<str>),
    Seq(Vec<Rule>),
    /// Ordered choice: the first alternative that matches wins.
    Choice(Vec<Rule>),
    Repeat(Box<Rule>),
    Repeat1(Box<Rule>),
    Optional(Box<Rule>),
    /// Labels every node produced by the inner rule with a field name.
    Field(Box<str>, Box<Rule>),
}

impl Rule {
    pub fn sym(name: impl Into<Box<str>>) -> Self {
        Self::Symbol(name.into())
    }

    pub fn literal(text: impl Into<Box<str>>) -> Self {
        Self::Literal(text.into())
    }

    pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::Seq(rules.into_iter().collect())
    }

    pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::Choice(rules.into_iter().collect())
    }

    pub fn repeat(rule: Rule) -> Self {
        Self::Repeat(Box::new(rule))
    }

    pub fn repeat1(rule: Rule) -> Self {
        Self::Repeat1(Box::new(rule))
    }

    pub fn optional(rule: Rule) -> Self {
        Self::Optional(Box::new(rule))
    }

    pub fn field(name: impl Into<Box<str>>, rule: Rule) -> Self {
        Self::Field(name.into(), Box::new(rule))
    }

    /// Visits the rule and all of its sub-rules in pre-order.
    pub(crate) fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Rule)) {
        f(self);
        match self {
            Rule::Blank | Rule::Symbol(_) | Rule::Literal(_) => {}
            Rule::Seq(rules) | Rule::Choice(rules) => {
                for rule in rules {
                    rule.walk(f);
                }
            }
            Rule::Repeat(rule) | Rule::Repeat1(rule) | Rule::Optional(rule) => rule.walk(f),
            Rule::Field(_, rule) => rule.walk(f),
        }
    }
}

/// How a token's text is recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenPattern {
    /// Exactly this text.
    Literal(Box<str>),
    /// A regular expression in `regex` crate syntax, matched at the current
    /// position.
    Regex(Box<str>),
}

impl TokenPattern {
    pub fn literal(text: impl Into<Box<str>>) -> Self {
        Self::Literal(text.into())
    }

    pub fn regex(pattern: impl Into<Box<str>>) -> Self {
        Self::Regex(pattern.into())
    }
}
