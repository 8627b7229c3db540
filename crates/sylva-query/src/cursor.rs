use std::collections::{BTreeSet, VecDeque};
use std::ops::Range;

use rustc_hash::{FxHashMap, FxHashSet};
use sylva_tree::{Node, Point};

use crate::Query;
use crate::matcher::{self, Sibling};

/// Settings and state for running queries.
///
/// A cursor can run any number of queries, one at a time.
#[derive(Clone, Debug)]
pub struct QueryCursor {
    match_limit: u32,
    byte_range: Range<u32>,
    point_range: Range<Point>,
    exceeded_match_limit: bool,
}

impl Default for QueryCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCursor {
    pub fn new() -> Self {
        Self {
            match_limit: u32::MAX,
            byte_range: 0..u32::MAX,
            point_range: Point::ZERO..Point::MAX,
            exceeded_match_limit: false,
        }
    }

    pub fn match_limit(&self) -> u32 {
        self.match_limit
    }

    /// Caps the number of matches one execution produces.
    pub fn set_match_limit(&mut self, limit: u32) {
        self.match_limit = limit;
    }

    pub fn did_exceed_match_limit(&self) -> bool {
        self.exceeded_match_limit
    }

    /// Only report matches whose first node intersects `range`.
    pub fn set_byte_range(&mut self, range: Range<u32>) {
        self.byte_range = range;
    }

    pub fn set_point_range(&mut self, range: Range<Point>) {
        self.point_range = range;
    }

    /// Runs `query` over `node` and its descendants.
    ///
    /// A query compiled for another grammar is not an error here: its node
    /// types mean nothing in this tree, so a warning is logged and the
    /// returned matches are empty. Grammars are compared by identity.
    pub fn exec<'cursor, 'query, 'tree>(
        &'cursor mut self,
        query: &'query Query,
        node: Node<'tree>,
    ) -> QueryMatches<'cursor, 'query, 'tree> {
        self.exceeded_match_limit = false;
        let compatible = node.grammar() == query.grammar();
        if !compatible {
            tracing::warn!(
                tree = node.grammar().name(),
                query = query.grammar().name(),
                "query and tree use different grammars"
            );
        }
        QueryMatches {
            cursor: self,
            query,
            stack: vec![Level { siblings: vec![(node, None)], next: 0 }],
            pending: VecDeque::new(),
            queued_captures: BTreeSet::new(),
            capture_matches: FxHashMap::default(),
            removed: FxHashSet::default(),
            frontier: 0,
            next_id: 0,
            walk_done: !compatible,
        }
    }

    fn covers(&self, node: Node<'_>) -> bool {
        overlaps(node.start_byte(), node.end_byte(), &self.byte_range)
            && overlaps(node.start_position(), node.end_position(), &self.point_range)
    }
}

fn overlaps<T: Ord>(start: T, end: T, range: &Range<T>) -> bool {
    if start == end {
        range.start <= start && start < range.end
    } else {
        start < range.end && end > range.start
    }
}

/// One match of one pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMatch<'tree> {
    /// Unique within one execution.
    pub id: u32,
    pub pattern_index: usize,
    /// In the order the captures appear in the pattern.
    pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> QueryMatch<'tree> {
    pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
        self.captures.iter().filter(move |capture| capture.index == index).map(|capture| capture.node)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryCapture<'tree> {
    pub node: Node<'tree>,
    pub index: u32,
}

/// Sibling list being walked, with the position of the next one to visit.
struct Level<'tree> {
    siblings: Vec<Sibling<'tree>>,
    next: usize,
}

/// The matches of one query execution, produced lazily in preorder of
/// their first node.
pub struct QueryMatches<'cursor, 'query, 'tree> {
    cursor: &'cursor mut QueryCursor,
    query: &'query Query,
    stack: Vec<Level<'tree>>,
    pending: VecDeque<QueryMatch<'tree>>,
    /// Captures not yet returned by `next_capture`, keyed by start byte,
    /// match id and position within the match.
    queued_captures: BTreeSet<(u32, u32, usize)>,
    capture_matches: FxHashMap<u32, QueryMatch<'tree>>,
    removed: FxHashSet<u32>,
    /// Start of the last visited node. No later match can capture anything
    /// before it.
    frontier: u32,
    next_id: u32,
    walk_done: bool,
}

impl<'tree> QueryMatches<'_, '_, 'tree> {
    pub fn next_match(&mut self) -> Option<QueryMatch<'tree>> {
        loop {
            if let Some(found) = self.pending.pop_front() {
                return Some(found);
            }
            if !self.visit_next() {
                return None;
            }
        }
    }

    /// The next capture in document order, with the match it belongs to and
    /// its position in that match's captures.
    pub fn next_capture(&mut self) -> Option<(QueryMatch<'tree>, usize)> {
        loop {
            if let Some(&(start, id, index)) = self.queued_captures.first() {
                if self.walk_done || start < self.frontier {
                    self.queued_captures.pop_first();
                    if self.removed.contains(&id) {
                        continue;
                    }
                    if let Some(found) = self.capture_matches.get(&id) {
                        return Some((found.clone(), index));
                    }
                    continue;
                }
            }
            if self.walk_done {
                return None;
            }
            self.visit_next();
            while let Some(found) = self.pending.pop_front() {
                for (index, capture) in found.captures.iter().enumerate() {
                    self.queued_captures.insert((capture.node.start_byte(), found.id, index));
                }
                self.capture_matches.insert(found.id, found);
            }
        }
    }

    /// Drops a match so none of its remaining captures are reported.
    pub fn remove_match(&mut self, id: u32) {
        self.removed.insert(id);
        self.pending.retain(|pending| pending.id != id);
    }

    pub fn did_exceed_match_limit(&self) -> bool {
        self.cursor.exceeded_match_limit
    }

    /// Visits one more node, queueing the matches that start there.
    /// Returns `false` once the walk is over.
    fn visit_next(&mut self) -> bool {
        while !self.walk_done {
            let Some(level) = self.stack.last_mut() else {
                self.walk_done = true;
                break;
            };
            let Some(&(node, _)) = level.siblings.get(level.next) else {
                self.stack.pop();
                continue;
            };
            let index = level.next;
            level.next += 1;
            if !self.cursor.covers(node) {
                continue;
            }

            self.frontier = node.start_byte();
            let siblings = &self.stack[self.stack.len() - 1].siblings;
            for (pattern_index, pattern) in self.query.patterns().iter().enumerate() {
                if pattern.disabled {
                    continue;
                }
                for bindings in matcher::matches_at(pattern, siblings, index) {
                    if self.next_id >= self.cursor.match_limit {
                        tracing::debug!(limit = self.cursor.match_limit, "query match limit exceeded");
                        self.cursor.exceeded_match_limit = true;
                        self.walk_done = true;
                        return true;
                    }
                    let captures = bindings
                        .into_iter()
                        .filter(|binding| !self.query.is_capture_disabled(binding.capture))
                        .map(|binding| QueryCapture { node: binding.node, index: binding.capture })
                        .collect();
                    self.pending.push_back(QueryMatch { id: self.next_id, pattern_index, captures });
                    self.next_id += 1;
                }
            }

            let children = node.children_with_fields().collect::<Vec<_>>();
            if !children.is_empty() {
                self.stack.push(Level { siblings: children, next: 0 });
            }
            return true;
        }
        false
    }
}

impl<'tree> Iterator for QueryMatches<'_, '_, 'tree> {
    type Item = QueryMatch<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_match()
    }
}
