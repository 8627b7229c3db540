//! Node handles: lightweight, copyable views of one visible subtree inside a
//! [`Tree`].
//!
//! Hidden nodes never surface through this API. Their children are treated
//! as children of the nearest visible ancestor, and a field attached to a
//! hidden node applies to each of its visible descendants.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

use sylva_grammar::{FieldId, Grammar, Symbol};
use text_size::TextRange;

use crate::subtree::SubtreeData;
use crate::{Length, Point, Range, Tree, TreeCursor};

#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree SubtreeData,
    /// Absolute start of the node's content.
    position: Length,
    /// Offset applied to the whole tree.
    origin: Length,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(
        tree: &'tree Tree,
        subtree: &'tree SubtreeData,
        position: Length,
        origin: Length,
    ) -> Self {
        Self { tree, subtree, position, origin }
    }

    pub(crate) fn subtree(self) -> &'tree SubtreeData {
        self.subtree
    }

    pub(crate) fn position(self) -> Length {
        self.position
    }

    pub(crate) fn origin(self) -> Length {
        self.origin
    }

    /// A value identifying this node within its tree.
    pub fn id(self) -> usize {
        ptr::from_ref(self.subtree) as usize
    }

    pub fn tree(self) -> &'tree Tree {
        self.tree
    }

    pub fn grammar(self) -> &'tree Grammar {
        self.tree.grammar()
    }

    pub fn kind_id(self) -> Symbol {
        self.subtree.symbol
    }

    pub fn kind(self) -> &'tree str {
        self.grammar().symbol_name(self.subtree.symbol).unwrap_or_default()
    }

    pub fn is_named(self) -> bool {
        self.subtree.is_visible() && self.subtree.is_named()
    }

    pub fn is_missing(self) -> bool {
        self.subtree.is_missing()
    }

    pub fn is_extra(self) -> bool {
        self.subtree.is_extra()
    }

    pub fn is_error(self) -> bool {
        self.subtree.is_error()
    }

    pub fn has_error(self) -> bool {
        self.subtree.has_error()
    }

    pub fn has_changes(self) -> bool {
        self.subtree.has_changes()
    }

    pub fn start_byte(self) -> u32 {
        self.position.bytes.into()
    }

    pub fn end_byte(self) -> u32 {
        self.end().bytes.into()
    }

    pub fn start_position(self) -> Point {
        self.position.extent
    }

    pub fn end_position(self) -> Point {
        self.end().extent
    }

    pub fn byte_range(self) -> TextRange {
        TextRange::new(self.position.bytes, self.end().bytes)
    }

    pub fn range(self) -> Range {
        Range::new(self.position, self.end())
    }

    fn end(self) -> Length {
        self.position + self.subtree.size
    }

    pub fn child_count(self) -> usize {
        self.subtree.visible_child_count as usize
    }

    pub fn named_child_count(self) -> usize {
        self.subtree.named_child_count as usize
    }

    pub fn child(self, index: usize) -> Option<Self> {
        self.child_at(index, false)
    }

    pub fn named_child(self, index: usize) -> Option<Self> {
        self.child_at(index, true)
    }

    fn child_at(self, mut index: usize, named: bool) -> Option<Self> {
        let mut parent = self;
        'descend: loop {
            for child in parent.raw_children() {
                let node = self.at(child.subtree, child.start);
                if child.subtree.is_visible() {
                    if !named || child.subtree.is_named() {
                        if index == 0 {
                            return Some(node);
                        }
                        index -= 1;
                    }
                } else {
                    let count = if named {
                        child.subtree.named_child_count
                    } else {
                        child.subtree.visible_child_count
                    } as usize;
                    if index < count {
                        parent = node;
                        continue 'descend;
                    }
                    index -= count;
                }
            }
            return None;
        }
    }

    pub fn children(self) -> Children<'tree> {
        Children::new(self)
    }

    pub fn named_children(self) -> impl Iterator<Item = Node<'tree>> {
        self.children().filter(|child| child.is_named())
    }

    /// Visible children paired with the field each one is attached to.
    pub fn children_with_fields(self) -> impl Iterator<Item = (Node<'tree>, Option<FieldId>)> {
        let mut children = self.children();
        std::iter::from_fn(move || children.next_with_field())
    }

    pub fn child_by_field_id(self, field: FieldId) -> Option<Self> {
        self.children_by_field_id(field).next()
    }

    pub fn child_by_field_name(self, name: &str) -> Option<Self> {
        self.child_by_field_id(self.grammar().field_id_for_name(name)?)
    }

    pub fn children_by_field_id(self, field: FieldId) -> impl Iterator<Item = Node<'tree>> {
        self.children_with_fields()
            .filter_map(move |(child, child_field)| (child_field == Some(field)).then_some(child))
    }

    pub fn children_by_field_name(
        self,
        name: &str,
    ) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        let field = self.grammar().field_id_for_name(name);
        self.children_with_fields().filter_map(move |(child, child_field)| {
            (field.is_some() && child_field == field).then_some(child)
        })
    }

    pub fn field_name_for_child(self, index: usize) -> Option<&'tree str> {
        let (_, field) = self.children_with_fields().nth(index)?;
        self.grammar().field_name_for_id(field?)
    }

    /// The nearest visible ancestor.
    pub fn parent(self) -> Option<Self> {
        let root = self.root();
        if self == root {
            return None;
        }

        // Descends from the root, remembering the nearest visible ancestor
        // of each level. Zero-width nodes can make several children overlap
        // `self`, so levels are revisited until it is found.
        let end = self.end().bytes;
        let mut stack = vec![(root.raw_children(), root)];
        while let Some((children, visible)) = stack.last_mut() {
            let visible = *visible;
            let Some(child) = children.next() else {
                stack.pop();
                continue;
            };
            if (child.start + child.subtree.size).bytes < end {
                continue;
            }
            if child.start.bytes > self.position.bytes {
                stack.pop();
                continue;
            }
            let node = self.at(child.subtree, child.start);
            if node == self {
                return Some(visible);
            }
            let visible = if child.subtree.is_visible() { node } else { visible };
            stack.push((node.raw_children(), visible));
        }
        None
    }

    fn root(self) -> Self {
        let root = self.tree.root_data();
        Self::new(self.tree, root, self.origin + root.padding, self.origin)
    }

    pub fn next_sibling(self) -> Option<Self> {
        self.sibling(true, false)
    }

    pub fn prev_sibling(self) -> Option<Self> {
        self.sibling(false, false)
    }

    pub fn next_named_sibling(self) -> Option<Self> {
        self.sibling(true, true)
    }

    pub fn prev_named_sibling(self) -> Option<Self> {
        self.sibling(false, true)
    }

    fn sibling(self, forward: bool, named: bool) -> Option<Self> {
        let mut found_self = false;
        let mut previous = None;
        for child in self.parent()?.children() {
            if child == self {
                if !forward {
                    return previous;
                }
                found_self = true;
            } else if !named || child.is_named() {
                if found_self {
                    return Some(child);
                }
                previous = Some(child);
            }
        }
        None
    }

    /// The first child that extends beyond the given byte.
    pub fn first_child_for_byte(self, byte: u32) -> Option<Self> {
        self.first_child_for(byte, false)
    }

    pub fn first_named_child_for_byte(self, byte: u32) -> Option<Self> {
        self.first_child_for(byte, true)
    }

    fn first_child_for(self, byte: u32, named: bool) -> Option<Self> {
        let mut parent = self;
        'descend: loop {
            for child in parent.raw_children() {
                let node = self.at(child.subtree, child.start);
                if node.end_byte() > byte {
                    if node.is_relevant(named) {
                        return Some(node);
                    }
                    if child.subtree.visible_child_count > 0 {
                        parent = node;
                        continue 'descend;
                    }
                }
            }
            return None;
        }
    }

    /// The smallest node spanning the given byte range.
    pub fn descendant_for_byte_range(self, start: u32, end: u32) -> Option<Self> {
        Some(self.descendant_for(start, end, false, |length| u32::from(length.bytes)))
    }

    pub fn named_descendant_for_byte_range(self, start: u32, end: u32) -> Option<Self> {
        Some(self.descendant_for(start, end, true, |length| u32::from(length.bytes)))
    }

    pub fn descendant_for_point_range(self, start: Point, end: Point) -> Option<Self> {
        Some(self.descendant_for(start, end, false, |length| length.extent))
    }

    pub fn named_descendant_for_point_range(self, start: Point, end: Point) -> Option<Self> {
        Some(self.descendant_for(start, end, true, |length| length.extent))
    }

    fn descendant_for<K: Ord + Copy>(
        self,
        start: K,
        end: K,
        named: bool,
        key: impl Fn(Length) -> K,
    ) -> Self {
        let mut node = self;
        let mut last_visible = self;
        'descend: loop {
            for child in node.raw_children() {
                let child_end = key(child.start + child.subtree.size);
                // The child must reach the end of the range and extend past
                // its start.
                if child_end < end || child_end <= start {
                    continue;
                }
                if start < key(child.start) {
                    break;
                }
                node = self.at(child.subtree, child.start);
                if node.is_relevant(named) {
                    last_visible = node;
                }
                continue 'descend;
            }
            return last_visible;
        }
    }

    fn is_relevant(self, named: bool) -> bool {
        self.subtree.is_visible() && (!named || self.subtree.is_named())
    }

    pub fn walk(self) -> TreeCursor<'tree> {
        TreeCursor::new(self)
    }

    /// The node rendered as an S-expression of its named descendants.
    pub fn to_sexp(self) -> String {
        let mut out = String::new();
        crate::sexp::write_sexp(self, &mut out);
        out
    }

    /// The node's text, given the UTF-8 source it was parsed from.
    pub fn utf8_text<'a>(self, source: &'a [u8]) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(&source[self.start_byte() as usize..self.end_byte() as usize])
    }

    pub fn text<'a>(self, source: &'a str) -> &'a str {
        &source[self.byte_range()]
    }

    /// The node's text, given the UTF-16 source it was parsed from.
    pub fn utf16_text<'a>(self, source: &'a [u16]) -> &'a [u16] {
        &source[self.start_byte() as usize / 2..self.end_byte() as usize / 2]
    }

    fn at(self, subtree: &'tree SubtreeData, position: Length) -> Self {
        Self::new(self.tree, subtree, position, self.origin)
    }

    pub(crate) fn raw_children(self) -> RawChildren<'tree> {
        RawChildren::new(self.subtree, self.position)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tree, other.tree)
            && ptr::eq(self.subtree, other.subtree)
            && self.position == other.position
    }
}

impl Eq for Node<'_> {}

impl Hash for Node<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.tree, state);
        ptr::hash(self.subtree, state);
        self.position.hash(state);
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Node {} {} - {}}}", self.kind(), self.start_position(), self.end_position())
    }
}

/// A direct child of a subtree with its absolute content start.
#[derive(Clone, Copy)]
pub(crate) struct RawChild<'tree> {
    pub(crate) subtree: &'tree SubtreeData,
    pub(crate) start: Length,
    pub(crate) index: usize,
    pub(crate) field: Option<FieldId>,
}

/// Iterates the direct children of a subtree, hidden ones included.
#[derive(Clone)]
pub(crate) struct RawChildren<'tree> {
    parent: &'tree SubtreeData,
    index: usize,
    /// For the first child, the parent's content start, which already
    /// includes the child's padding. Afterwards, the end of the previous child.
    position: Length,
}

impl<'tree> RawChildren<'tree> {
    pub(crate) fn new(parent: &'tree SubtreeData, position: Length) -> Self {
        Self { parent, index: 0, position }
    }

    /// Resumes after `child`.
    pub(crate) fn after(parent: &'tree SubtreeData, child: RawChild<'tree>) -> Self {
        Self { parent, index: child.index + 1, position: child.start + child.subtree.size }
    }
}

impl<'tree> Iterator for RawChildren<'tree> {
    type Item = RawChild<'tree>;

    fn next(&mut self) -> Option<RawChild<'tree>> {
        let child = self.parent.children.get(self.index)?;
        let start = if self.index == 0 { self.position } else { self.position + child.padding };
        let raw = RawChild {
            subtree: child,
            start,
            index: self.index,
            field: self.parent.field_for_child(self.index),
        };
        self.position = start + child.size;
        self.index += 1;
        Some(raw)
    }
}

/// Visible children of a node, looking through hidden ones.
pub struct Children<'tree> {
    node: Node<'tree>,
    stack: Vec<(RawChildren<'tree>, Option<FieldId>)>,
}

impl<'tree> Children<'tree> {
    fn new(node: Node<'tree>) -> Self {
        Self { node, stack: vec![(node.raw_children(), None)] }
    }

    pub(crate) fn next_with_field(&mut self) -> Option<(Node<'tree>, Option<FieldId>)> {
        loop {
            let (raw, inherited) = self.stack.last_mut()?;
            let inherited = *inherited;
            let Some(child) = raw.next() else {
                self.stack.pop();
                continue;
            };
            let field = child.field.or(inherited);
            let node = self.node.at(child.subtree, child.start);
            if child.subtree.is_visible() {
                return Some((node, field));
            }
            if child.subtree.visible_child_count > 0 {
                self.stack.push((node.raw_children(), field));
            }
        }
    }
}

impl<'tree> Iterator for Children<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Node<'tree>> {
        self.next_with_field().map(|(node, _)| node)
    }
}
