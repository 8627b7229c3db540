use crate::{Node, TreeCursor};

/// Pre-order traversal yielding an event when a node is entered and when it
/// is left.
pub struct Preorder<'tree> {
    cursor: TreeCursor<'tree>,
    next: Option<WalkEvent<'tree>>,
    skip_subtree: bool,
}

impl<'tree> Preorder<'tree> {
    pub fn new(start: Node<'tree>) -> Self {
        Self { cursor: start.walk(), next: Some(WalkEvent::Enter(start)), skip_subtree: false }
    }

    /// Don't descend into the node that was just entered.
    pub fn skip_subtree(&mut self) {
        self.skip_subtree = true;
    }
}

impl<'tree> Iterator for Preorder<'tree> {
    type Item = WalkEvent<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.skip_subtree {
            self.next = self.next.take().map(|next| match next {
                WalkEvent::Enter(_) => {
                    self.cursor.goto_parent();
                    WalkEvent::Leave(self.cursor.node())
                }
                WalkEvent::Leave(node) => WalkEvent::Leave(node),
            });
            self.skip_subtree = false;
        }

        let next = self.next.take();

        self.next = next.as_ref().and_then(|event| {
            Some(match event {
                WalkEvent::Enter(node) => {
                    if self.cursor.goto_first_child() {
                        WalkEvent::Enter(self.cursor.node())
                    } else {
                        WalkEvent::Leave(*node)
                    }
                }
                WalkEvent::Leave(_) => {
                    if self.cursor.goto_next_sibling() {
                        WalkEvent::Enter(self.cursor.node())
                    } else if self.cursor.goto_parent() {
                        WalkEvent::Leave(self.cursor.node())
                    } else {
                        return None;
                    }
                }
            })
        });

        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'tree> {
    Enter(Node<'tree>),
    Leave(Node<'tree>),
}
