use std::fmt;
use std::sync::Arc;

use sylva_errors::Diagnostic;
use sylva_grammar::Grammar;

use crate::edit::{edit_range, edit_subtree};
use crate::subtree::{Subtree, SubtreeData};
use crate::{EditError, InputEdit, Length, Node, Point, Preorder, Range, TreeCursor, WalkEvent};

/// The result of a parse: an immutable root subtree plus the grammar and the
/// included ranges it was parsed with.
///
/// Cloning is cheap and shares all nodes. Editing a clone copies only the
/// nodes on the edited paths.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    grammar: Grammar,
    included_ranges: Arc<Vec<Range>>,
}

impl Tree {
    pub fn new(root: Subtree, grammar: Grammar, included_ranges: Vec<Range>) -> Self {
        let included_ranges =
            if included_ranges.is_empty() { vec![Range::EVERYTHING] } else { included_ranges };
        Self { root, grammar, included_ranges: Arc::new(included_ranges) }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, self.root.padding, Length::ZERO)
    }

    /// The root node with every position shifted by the given offset.
    pub fn root_node_with_offset(&self, offset_bytes: u32, offset_extent: Point) -> Node<'_> {
        let origin = Length::new(offset_bytes, offset_extent);
        Node::new(self, &self.root, origin + self.root.padding, origin)
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn root_subtree(&self) -> &Subtree {
        &self.root
    }

    pub(crate) fn root_data(&self) -> &SubtreeData {
        &self.root
    }

    pub fn included_ranges(&self) -> &[Range] {
        &self.included_ranges
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    /// Adjusts the tree for an edit of its source text.
    ///
    /// Nodes keep their structure; positions after the edit shift and nodes
    /// overlapping it are marked as changed so the next parse can tell what
    /// to reuse.
    pub fn edit(&mut self, edit: &InputEdit) -> Result<(), EditError> {
        edit.validate()?;
        tracing::trace!(?edit, "editing tree");
        edit_subtree(&mut self.root, edit.lengths());
        for range in Arc::make_mut(&mut self.included_ranges) {
            edit_range(range, edit);
        }
        Ok(())
    }

    /// Ranges whose syntactic structure differs between `self`, an edited
    /// old tree, and `new`, a tree parsed from the edited text.
    ///
    /// The result is sorted and its ranges do not overlap.
    pub fn changed_ranges(&self, new: &Tree) -> Vec<Range> {
        crate::changed::changed_ranges(self, new)
    }

    /// Error and missing nodes as diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for event in Preorder::new(self.root_node()) {
            let WalkEvent::Enter(node) = event else { continue };
            if node.is_missing() {
                let message = format!("missing {}", node.kind());
                diagnostics.push(Diagnostic::error(message, node.byte_range()).with_label("expected here"));
            } else if node.is_error() {
                diagnostics.push(Diagnostic::error("unexpected input", node.byte_range()));
            }
        }
        diagnostics
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Tree {:?}}}", self.root_node())
    }
}
