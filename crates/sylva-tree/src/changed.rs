//! Structural differences between an edited tree and its reparse.

use crate::node::RawChildren;
use crate::subtree::SubtreeData;
use crate::{Length, Range, Tree};

pub(crate) fn changed_ranges(old: &Tree, new: &Tree) -> Vec<Range> {
    let mut ranges = Vec::new();
    let old_root = old.root_data();
    let new_root = new.root_data();
    let mut pending = vec![(old_root, old_root.padding, new_root, new_root.padding)];
    while let Some((old, old_start, new, new_start)) = pending.pop() {
        compare(old, old_start, new, new_start, &mut pending, &mut ranges);
    }

    for range in old.included_ranges() {
        if !new.included_ranges().contains(range) {
            ranges.push(*range);
        }
    }
    for range in new.included_ranges() {
        if !old.included_ranges().contains(range) {
            ranges.push(*range);
        }
    }

    normalize(ranges)
}

type Pair<'a> = (&'a SubtreeData, Length, &'a SubtreeData, Length);

/// Records where `old` and `new` differ, queueing aligned children in `pending`.
fn compare<'a>(
    old: &'a SubtreeData,
    old_start: Length,
    new: &'a SubtreeData,
    new_start: Length,
    pending: &mut Vec<Pair<'a>>,
    ranges: &mut Vec<Range>,
) {
    if std::ptr::eq(old, new) && old_start == new_start {
        return;
    }
    let old_end = old_start + old.size;
    let new_end = new_start + new.size;
    let same_shape = old.symbol == new.symbol && old.flags.same_shape(new.flags);

    if !same_shape || old.is_leaf() || new.is_leaf() {
        let unchanged = same_shape
            && old.is_leaf()
            && new.is_leaf()
            && !old.has_changes()
            && old_start == new_start
            && old_end == new_end;
        if !unchanged {
            ranges.push(union(old_start, old_end, new_start, new_end));
        }
        return;
    }

    let old_children: Vec<_> = RawChildren::new(old, old_start).collect();
    let new_children: Vec<_> = RawChildren::new(new, new_start).collect();
    let aligned = |i: usize, j: usize| {
        let (a, b) = (old_children[i], new_children[j]);
        a.subtree.symbol == b.subtree.symbol && a.start == b.start
    };

    let mut prefix = 0;
    while prefix < old_children.len() && prefix < new_children.len() && aligned(prefix, prefix) {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old_children.len() - prefix
        && suffix < new_children.len() - prefix
        && aligned(old_children.len() - 1 - suffix, new_children.len() - 1 - suffix)
    {
        suffix += 1;
    }

    let pairs = (0..prefix)
        .map(|i| (i, i))
        .chain((0..suffix).map(|k| (old_children.len() - 1 - k, new_children.len() - 1 - k)));
    for (i, j) in pairs {
        let (a, b) = (old_children[i], new_children[j]);
        pending.push((a.subtree, a.start, b.subtree, b.start));
    }

    let old_middle = &old_children[prefix..old_children.len() - suffix];
    let new_middle = &new_children[prefix..new_children.len() - suffix];
    let bounds = old_middle
        .iter()
        .chain(new_middle)
        .map(|child| (child.start, child.start + child.subtree.size));
    let merged = bounds.reduce(|(start, end), (child_start, child_end)| {
        (min_length(start, child_start), max_length(end, child_end))
    });
    if let Some((start, end)) = merged {
        ranges.push(Range::new(start, end));
    }
}

fn union(a_start: Length, a_end: Length, b_start: Length, b_end: Length) -> Range {
    Range::new(min_length(a_start, b_start), max_length(a_end, b_end))
}

fn min_length(a: Length, b: Length) -> Length {
    if b.bytes < a.bytes { b } else { a }
}

fn max_length(a: Length, b: Length) -> Length {
    if b.bytes > a.bytes { b } else { a }
}

fn normalize(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.sort_by_key(|range| (range.start_byte, range.end_byte));
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start_byte <= last.end_byte => {
                if range.end_byte > last.end_byte {
                    last.end_byte = range.end_byte;
                    last.end_point = range.end_point;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}
