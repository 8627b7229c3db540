//! Applying text edits to existing trees.

use thiserror::Error;
use triomphe::Arc;

use crate::subtree::Subtree;
use crate::{Length, Point, Range};

/// A single replacement in the source text, in both coordinate systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: u32,
    pub old_end_byte: u32,
    pub new_end_byte: u32,
    pub start_position: Point,
    pub old_end_position: Point,
    pub new_end_position: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("edit starts at byte {start} after its old end {old_end}")]
    StartAfterOldEnd { start: u32, old_end: u32 },
    #[error("edit starts at byte {start} after its new end {new_end}")]
    StartAfterNewEnd { start: u32, new_end: u32 },
    #[error("edit start position {start} is after its end position {end}")]
    InvalidPosition { start: Point, end: Point },
}

impl InputEdit {
    pub fn validate(&self) -> Result<(), EditError> {
        if self.start_byte > self.old_end_byte {
            return Err(EditError::StartAfterOldEnd { start: self.start_byte, old_end: self.old_end_byte });
        }
        if self.start_byte > self.new_end_byte {
            return Err(EditError::StartAfterNewEnd { start: self.start_byte, new_end: self.new_end_byte });
        }
        for end in [self.old_end_position, self.new_end_position] {
            if self.start_position > end {
                return Err(EditError::InvalidPosition { start: self.start_position, end });
            }
        }
        Ok(())
    }

    pub(crate) fn lengths(&self) -> Edit {
        Edit {
            start: Length::new(self.start_byte, self.start_position),
            old_end: Length::new(self.old_end_byte, self.old_end_position),
            new_end: Length::new(self.new_end_byte, self.new_end_position),
        }
    }
}

/// An edit expressed relative to the start of some subtree's padding.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Edit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

/// Shifts and resizes `subtree` for `edit`, copying only the nodes on paths
/// that touch the edited region and marking them changed.
pub(crate) fn edit_subtree(subtree: &mut Subtree, edit: Edit) {
    let mut stack: Vec<Level<'_>> = edit_node(subtree, edit).into_iter().collect();
    while let Some(level) = stack.last_mut() {
        let Some((index, child)) = level.children.next() else {
            stack.pop();
            continue;
        };
        let child_size = child.total_size();
        let child_left = level.child_right;
        let child_right = child_left + child_size;
        level.child_right = child_right;

        let edit = &mut level.edit;
        // Children that end before the edit, including what they looked at.
        if u32::from(child_right.bytes) + child.lookahead_bytes < u32::from(edit.start.bytes) {
            continue;
        }
        // Children that start after the edit.
        if child_left.bytes > edit.old_end.bytes
            || (child_left.bytes == edit.old_end.bytes && u32::from(child_size.bytes) > 0 && index > 0)
        {
            stack.pop();
            continue;
        }

        let mut child_edit = Edit {
            start: edit.start.saturating_sub(child_left),
            old_end: edit.old_end.saturating_sub(child_left),
            new_end: edit.new_end.saturating_sub(child_left),
        };
        // Only the first child that touches the edit receives inserted text.
        let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;
        if child_right.bytes > edit.start.bytes || (child_right.bytes == edit.start.bytes && is_pure_insertion) {
            edit.new_end = edit.start;
        } else {
            child_edit.old_end = child_edit.start;
            child_edit.new_end = child_edit.start;
        }
        stack.extend(edit_node(child, child_edit));
    }
}

/// Children of an edited node still to be visited.
struct Level<'a> {
    children: std::iter::Enumerate<std::slice::IterMut<'a, Subtree>>,
    edit: Edit,
    child_right: Length,
}

/// Resizes one node, returning its children if the edit reaches them.
fn edit_node(subtree: &mut Subtree, edit: Edit) -> Option<Level<'_>> {
    let start = u32::from(edit.start.bytes);
    let old_end = u32::from(edit.old_end.bytes);
    let new_end = u32::from(edit.new_end.bytes);
    let is_noop = old_end == start && new_end == start;
    let is_pure_insertion = old_end == start;

    let total = subtree.total_size();
    let end = u32::from(total.bytes) + subtree.lookahead_bytes;
    if start > end || (is_noop && start == end) {
        return None;
    }

    let node = Arc::make_mut(subtree);
    let padding = node.padding;
    let size = node.size;
    if old_end <= u32::from(padding.bytes) {
        // The edit is entirely within the padding.
        node.padding = edit.new_end + (padding - edit.old_end);
    } else if start < u32::from(padding.bytes) {
        // The edit starts in the padding and ends in the content.
        node.size = size.saturating_sub(edit.old_end - padding);
        node.padding = edit.new_end;
    } else if start < u32::from(total.bytes) || (start == u32::from(total.bytes) && is_pure_insertion)
    {
        node.size = (edit.new_end - padding) + total.saturating_sub(edit.old_end);
    }
    node.mark_changed();

    Some(Level { children: node.children.iter_mut().enumerate(), edit, child_right: Length::ZERO })
}

/// Moves included ranges so they keep covering the same text.
pub(crate) fn edit_range(range: &mut Range, edit: &InputEdit) {
    if range.end_byte >= edit.old_end_byte {
        if range.end_byte != u32::MAX {
            range.end_byte = edit.new_end_byte + (range.end_byte - edit.old_end_byte);
            range.end_point = edit.new_end_position + (range.end_point - edit.old_end_position);
            if range.end_byte < edit.new_end_byte {
                range.end_byte = u32::MAX;
                range.end_point = Point::MAX;
            }
        }
    } else if range.end_byte > edit.start_byte {
        range.end_byte = edit.start_byte;
        range.end_point = edit.start_position;
    }

    if range.start_byte >= edit.old_end_byte {
        range.start_byte = edit.new_end_byte + (range.start_byte - edit.old_end_byte);
        range.start_point = edit.new_end_position + (range.start_point - edit.old_end_position);
        if range.start_byte < edit.new_end_byte {
            range.start_byte = u32::MAX;
            range.start_point = Point::MAX;
        }
    } else if range.start_byte > edit.start_byte {
        range.start_byte = edit.start_byte;
        range.start_point = edit.start_position;
    }
}
