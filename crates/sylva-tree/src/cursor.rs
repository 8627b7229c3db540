//! Stateful traversal over the visible nodes below a starting node.

use sylva_grammar::{FieldId, Symbol};

use crate::node::{RawChild, RawChildren};
use crate::subtree::SubtreeData;
use crate::{Length, Node, Point, Tree};

#[derive(Clone, Copy)]
struct Entry<'tree> {
    subtree: &'tree SubtreeData,
    start: Length,
    /// Index in the parent entry's children.
    index: usize,
    /// The entry's own field, or the one inherited from hidden ancestors.
    field: Option<FieldId>,
}

impl<'tree> Entry<'tree> {
    fn raw(self) -> RawChild<'tree> {
        RawChild { subtree: self.subtree, start: self.start, index: self.index, field: self.field }
    }
}

/// A cursor over a subtree.
///
/// The cursor never moves above the node it was created from. Moving is
/// cheaper than with [`Node`] methods because the path to the current node is
/// kept on a stack.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
    tree: &'tree Tree,
    origin: Length,
    stack: Vec<Entry<'tree>>,
}

impl<'tree> TreeCursor<'tree> {
    pub fn new(node: Node<'tree>) -> Self {
        let mut cursor = Self { tree: node.tree(), origin: node.origin(), stack: Vec::new() };
        cursor.reset(node);
        cursor
    }

    /// Re-roots the cursor at `node`.
    pub fn reset(&mut self, node: Node<'tree>) {
        self.tree = node.tree();
        self.origin = node.origin();
        self.stack.clear();
        self.stack.push(Entry {
            subtree: node.subtree(),
            start: node.position(),
            index: 0,
            field: None,
        });
    }

    fn top(&self) -> Entry<'tree> {
        *self.stack.last().expect("cursor stack is never empty")
    }

    fn children_of_top(&self) -> impl Iterator<Item = (Entry<'tree>, bool)> + use<'tree> {
        let top = self.top();
        let inherit = self.stack.len() > 1 && !top.subtree.is_visible();
        RawChildren::new(top.subtree, top.start).map(move |child| child_entry(child, top, inherit))
    }

    pub fn node(&self) -> Node<'tree> {
        let top = self.top();
        Node::new(self.tree, top.subtree, top.start, self.origin)
    }

    pub fn field_id(&self) -> Option<FieldId> {
        self.top().field
    }

    pub fn field_name(&self) -> Option<&'tree str> {
        self.tree.grammar().field_name_for_id(self.field_id()?)
    }

    pub fn symbol(&self) -> Symbol {
        self.top().subtree.symbol()
    }

    /// Number of visible nodes between the current node and the cursor's root.
    pub fn depth(&self) -> usize {
        self.stack[1..].iter().filter(|entry| entry.subtree.is_visible()).count()
    }

    pub fn goto_first_child(&mut self) -> bool {
        loop {
            let mut descended = false;
            for (entry, visible) in self.children_of_top() {
                if visible {
                    self.stack.push(entry);
                    return true;
                }
                if entry.subtree.visible_child_count() > 0 {
                    self.stack.push(entry);
                    descended = true;
                    break;
                }
            }
            if !descended {
                return false;
            }
        }
    }

    pub fn goto_last_child(&mut self) -> bool {
        if !self.goto_first_child() {
            return false;
        }
        while self.goto_next_sibling() {}
        true
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let initial = self.stack.clone();
        while self.stack.len() > 1 {
            let Some(entry) = self.stack.pop() else { break };
            let parent = self.top();
            if entry.subtree.is_visible() && self.stack.len() + 1 < initial.len() {
                break;
            }
            let inherit = self.stack.len() > 1 && !parent.subtree.is_visible();
            for child in RawChildren::after(parent.subtree, entry.raw()) {
                let (entry, visible) = child_entry(child, parent, inherit);
                if visible {
                    self.stack.push(entry);
                    return true;
                }
                if entry.subtree.visible_child_count() > 0 {
                    self.stack.push(entry);
                    self.goto_first_child();
                    return true;
                }
            }
        }
        self.stack = initial;
        false
    }

    pub fn goto_previous_sibling(&mut self) -> bool {
        let current = self.node();
        let initial = self.stack.clone();
        if !self.goto_parent() {
            return false;
        }
        self.goto_first_child();
        let mut previous = None;
        loop {
            if self.node() == current {
                break;
            }
            previous = Some(self.stack.clone());
            if !self.goto_next_sibling() {
                break;
            }
        }
        match previous {
            Some(stack) => {
                self.stack = stack;
                true
            }
            None => {
                self.stack = initial;
                false
            }
        }
    }

    pub fn goto_parent(&mut self) -> bool {
        for index in (0..self.stack.len().saturating_sub(1)).rev() {
            if index == 0 || self.stack[index].subtree.is_visible() {
                self.stack.truncate(index + 1);
                return true;
            }
        }
        false
    }

    /// Moves to the first child extending beyond `byte`, returning its index
    /// among the visible children.
    pub fn goto_first_child_for_byte(&mut self, byte: u32) -> Option<usize> {
        self.goto_first_child_for(|end| u32::from(end.bytes) > byte)
    }

    pub fn goto_first_child_for_point(&mut self, point: Point) -> Option<usize> {
        self.goto_first_child_for(|end| end.extent > point)
    }

    fn goto_first_child_for(&mut self, past_goal: impl Fn(Length) -> bool) -> Option<usize> {
        let initial = self.stack.len();
        let mut visible_index = 0;
        loop {
            let mut descended = false;
            for (entry, visible) in self.children_of_top() {
                let count = entry.subtree.visible_child_count() as usize;
                if past_goal(entry.start + entry.subtree.size()) {
                    if visible {
                        self.stack.push(entry);
                        return Some(visible_index);
                    }
                    if count > 0 {
                        self.stack.push(entry);
                        descended = true;
                        break;
                    }
                } else if visible {
                    visible_index += 1;
                } else {
                    visible_index += count;
                }
            }
            if !descended {
                self.stack.truncate(initial);
                return None;
            }
        }
    }
}

fn child_entry<'tree>(
    child: RawChild<'tree>,
    parent: Entry<'tree>,
    inherit: bool,
) -> (Entry<'tree>, bool) {
    let field = child.field.or(if inherit { parent.field } else { None });
    let entry = Entry { subtree: child.subtree, start: child.start, index: child.index, field };
    (entry, child.subtree.is_visible())
}
