//! Finds every way a pattern matches at one node.
//!
//! Matching is a depth-first search over the pattern tree written in
//! continuation-passing style: each step receives what should happen with
//! the siblings after it. Quantified patterns are greedy. Each repetition
//! takes the next sibling that matches, and fewer repetitions are only tried
//! when the rest of the pattern cannot match otherwise. Repetitions keep
//! their own stack, so the depth of the search follows the pattern, not the
//! number of siblings.

use sylva_grammar::FieldId;
use sylva_tree::Node;

use crate::pattern::{Element, ElementKind, Item, NodeTest, Pattern};

pub(crate) type Sibling<'tree> = (Node<'tree>, Option<FieldId>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Binding<'tree> {
    pub(crate) order: u32,
    pub(crate) capture: u32,
    pub(crate) node: Node<'tree>,
}

type Bindings<'tree> = Vec<Binding<'tree>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    /// Any number of siblings may be skipped.
    Free,
    /// Only unnamed siblings may be skipped.
    Adjacent,
    /// The sibling at the current position must match.
    Exact,
}

/// Distinct capture assignments of `pattern` for matches starting at
/// `siblings[index]`, each sorted by capture declaration order.
pub(crate) fn matches_at<'tree>(
    pattern: &Pattern,
    siblings: &[Sibling<'tree>],
    index: usize,
) -> Vec<Bindings<'tree>> {
    let mut solutions: Vec<Bindings<'tree>> = Vec::new();
    let mut bindings = Vec::new();
    seq(&pattern.items, siblings, index, Anchor::Exact, &mut bindings, &mut |_, bindings: &mut Bindings<'tree>| {
        let mut found = bindings.clone();
        found.sort_by_key(|binding| binding.order);
        if !solutions.contains(&found) {
            solutions.push(found);
        }
        true
    });
    solutions
}

type Next<'k, 'tree> = dyn FnMut(usize, &mut Bindings<'tree>) -> bool + 'k;

fn seq<'tree>(
    items: &[Item],
    siblings: &[Sibling<'tree>],
    pos: usize,
    anchor: Anchor,
    bindings: &mut Bindings<'tree>,
    next: &mut Next<'_, 'tree>,
) -> bool {
    match items.split_first() {
        None => {
            if anchor == Anchor::Adjacent && siblings[pos..].iter().any(|(node, _)| node.is_named()) {
                return false;
            }
            next(pos, bindings)
        }
        Some((Item::Anchor, rest)) => {
            let anchor = if anchor == Anchor::Exact { anchor } else { Anchor::Adjacent };
            seq(rest, siblings, pos, anchor, bindings, next)
        }
        Some((Item::Element(element), rest)) => quantified(
            element,
            siblings,
            pos,
            anchor,
            bindings,
            &mut |end, bindings: &mut Bindings<'tree>| seq(rest, siblings, end, Anchor::Free, bindings, next),
        ),
    }
}

fn quantified<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    pos: usize,
    anchor: Anchor,
    bindings: &mut Bindings<'tree>,
    next: &mut Next<'_, 'tree>,
) -> bool {
    let (min, max) = element.quantifier.bounds();
    if (min, max) == (1, 1) {
        return once(element, siblings, pos, anchor, false, bindings, next);
    }
    // A match has to start with a node, not with an empty repetition.
    let min = if anchor == Anchor::Exact { min.max(1) } else { min };
    repeat(element, siblings, pos, anchor, min, bindings, next)
}

/// One way a single repetition can match: where it ends and what it binds.
type Way<'tree> = (usize, Bindings<'tree>);

struct Repetition<'tree> {
    count: usize,
    pos: usize,
    ways: Vec<Way<'tree>>,
    next_way: usize,
    /// Length of `bindings` when the repetition started.
    mark: usize,
    found: bool,
}

/// Walks back from the longest run of repetitions on an explicit stack of
/// end positions.
fn repeat<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    pos: usize,
    anchor: Anchor,
    min: usize,
    bindings: &mut Bindings<'tree>,
    next: &mut Next<'_, 'tree>,
) -> bool {
    let (_, max) = element.quantifier.bounds();
    let mut stack = vec![repetition(element, siblings, pos, anchor, 0, max, bindings)];
    loop {
        let Some(current) = stack.last_mut() else {
            return false;
        };
        let count = current.count;
        if let Some((end, added)) = current.ways.get(current.next_way) {
            current.next_way += 1;
            let end = *end;
            bindings.truncate(current.mark);
            bindings.extend_from_slice(added);
            let deeper = repetition(element, siblings, end, Anchor::Free, count + 1, max, bindings);
            stack.push(deeper);
            continue;
        }

        bindings.truncate(current.mark);
        let found = current.found || (count >= min && next(current.pos, bindings));
        stack.pop();
        match stack.last_mut() {
            Some(parent) => parent.found |= found,
            None => return found,
        }
    }
}

fn repetition<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    pos: usize,
    anchor: Anchor,
    count: usize,
    max: usize,
    bindings: &mut Bindings<'tree>,
) -> Repetition<'tree> {
    let mark = bindings.len();
    let mut ways = Vec::new();
    if count < max {
        once(element, siblings, pos, anchor, true, bindings, &mut |end, bindings: &mut Bindings<'tree>| {
            if end > pos {
                ways.push((end, bindings[mark..].to_vec()));
            }
            true
        });
    }
    Repetition { count, pos, ways, next_way: 0, mark, found: false }
}

/// Matches `element` once. With `first_only`, a single-node pattern stops
/// at the first sibling it matches.
fn once<'tree>(
    element: &Element,
    siblings: &[Sibling<'tree>],
    pos: usize,
    anchor: Anchor,
    first_only: bool,
    bindings: &mut Bindings<'tree>,
    next: &mut Next<'_, 'tree>,
) -> bool {
    match &element.kind {
        ElementKind::Group(items) => seq(items, siblings, pos, anchor, bindings, next),
        ElementKind::Alternation(alternatives) => {
            let mut found = false;
            for alternative in alternatives {
                found |= quantified(alternative, siblings, pos, anchor, bindings, next);
                if found && first_only {
                    break;
                }
            }
            found
        }
        ElementKind::Node { .. } => {
            let mut found = false;
            for index in candidates(siblings, pos, anchor) {
                let (node, field) = siblings[index];
                let mut matched = false;
                found |= node_matches(element, node, field, bindings, &mut |bindings: &mut Bindings<'tree>| {
                    matched = true;
                    next(index + 1, bindings)
                });
                if matched && first_only {
                    break;
                }
            }
            found
        }
    }
}

/// Sibling positions a single-node pattern may match at.
fn candidates(siblings: &[Sibling<'_>], pos: usize, anchor: Anchor) -> std::ops::Range<usize> {
    let len = siblings.len();
    match anchor {
        Anchor::Free => pos.min(len)..len,
        Anchor::Exact => pos.min(len)..(pos + 1).min(len),
        Anchor::Adjacent => {
            let named = siblings[pos.min(len)..].iter().position(|(node, _)| node.is_named());
            pos.min(len)..named.map_or(len, |offset| pos + offset + 1)
        }
    }
}

fn node_matches<'tree>(
    element: &Element,
    node: Node<'tree>,
    field: Option<FieldId>,
    bindings: &mut Bindings<'tree>,
    next: &mut dyn FnMut(&mut Bindings<'tree>) -> bool,
) -> bool {
    let ElementKind::Node { test, children, negated_fields } = &element.kind else {
        return false;
    };
    if element.field.is_some_and(|expected| field != Some(expected)) || !passes(*test, node) {
        return false;
    }
    if negated_fields.iter().any(|&field| node.child_by_field_id(field).is_some()) {
        return false;
    }

    let mark = bindings.len();
    bindings.extend(element.captures.iter().map(|capture| Binding {
        order: capture.order,
        capture: capture.id,
        node,
    }));
    let found = if children.is_empty() {
        next(bindings)
    } else {
        let children_of_node = node.children_with_fields().collect::<Vec<_>>();
        seq(children, &children_of_node, 0, Anchor::Free, bindings, &mut |_, bindings: &mut Bindings<'tree>| {
            next(bindings)
        })
    };
    bindings.truncate(mark);
    found
}

fn passes(test: NodeTest, node: Node<'_>) -> bool {
    match test {
        NodeTest::Any { named_only } => !named_only || node.is_named(),
        NodeTest::Symbol(symbol) => node.kind_id() == symbol,
        NodeTest::Error => node.is_error(),
        NodeTest::Missing(None) => node.is_missing(),
        NodeTest::Missing(Some(symbol)) => node.is_missing() && node.kind_id() == symbol,
    }
}
