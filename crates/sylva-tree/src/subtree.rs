//! Persistent, reference-counted subtrees.
//!
//! Subtrees store sizes instead of absolute positions, so an unchanged
//! subtree can be shared between the trees of successive document revisions.
//! Positions are recomputed while descending from the root.

use std::fmt;

use sylva_grammar::{ERROR_SYMBOL, FieldId, Symbol};

use crate::Length;

pub type Subtree = triomphe::Arc<SubtreeData>;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct Flags(u16);

impl Flags {
    pub(crate) const VISIBLE: u16 = 1 << 0;
    pub(crate) const NAMED: u16 = 1 << 1;
    pub(crate) const EXTRA: u16 = 1 << 2;
    pub(crate) const MISSING: u16 = 1 << 3;
    pub(crate) const HAS_CHANGES: u16 = 1 << 4;
    pub(crate) const HAS_ERROR: u16 = 1 << 5;

    /// Flags that describe what a subtree is, as opposed to its history.
    const SHAPE: u16 = Self::VISIBLE | Self::NAMED | Self::EXTRA | Self::MISSING | Self::HAS_ERROR;

    pub(crate) fn contains(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub(crate) fn set(&mut self, flag: u16, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    pub(crate) fn same_shape(self, other: Self) -> bool {
        self.0 & Self::SHAPE == other.0 & Self::SHAPE
    }
}

#[derive(Clone)]
pub struct SubtreeData {
    pub(crate) symbol: Symbol,
    pub(crate) flags: Flags,
    /// Text skipped before the subtree's first token.
    pub(crate) padding: Length,
    pub(crate) size: Length,
    /// Bytes past the end that the lexer looked at while producing it.
    pub(crate) lookahead_bytes: u32,
    pub(crate) visible_child_count: u32,
    pub(crate) named_child_count: u32,
    pub(crate) children: Box<[Subtree]>,
    pub(crate) fields: Option<Box<[Option<FieldId>]>>,
}

impl SubtreeData {
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn padding(&self) -> Length {
        self.padding
    }

    pub fn size(&self) -> Length {
        self.size
    }

    pub fn total_size(&self) -> Length {
        self.padding + self.size
    }

    pub fn lookahead_bytes(&self) -> u32 {
        self.lookahead_bytes
    }

    pub fn children(&self) -> &[Subtree] {
        &self.children
    }

    pub fn field_for_child(&self, index: usize) -> Option<FieldId> {
        self.fields.as_ref()?.get(index).copied().flatten()
    }

    pub fn is_visible(&self) -> bool {
        self.flags.contains(Flags::VISIBLE)
    }

    pub fn is_named(&self) -> bool {
        self.flags.contains(Flags::NAMED)
    }

    pub fn is_extra(&self) -> bool {
        self.flags.contains(Flags::EXTRA)
    }

    pub fn is_missing(&self) -> bool {
        self.flags.contains(Flags::MISSING)
    }

    pub fn is_error(&self) -> bool {
        self.symbol == ERROR_SYMBOL
    }

    pub fn has_changes(&self) -> bool {
        self.flags.contains(Flags::HAS_CHANGES)
    }

    pub fn has_error(&self) -> bool {
        self.flags.contains(Flags::HAS_ERROR)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn visible_child_count(&self) -> u32 {
        self.visible_child_count
    }

    pub fn named_child_count(&self) -> u32 {
        self.named_child_count
    }

    pub(crate) fn mark_changed(&mut self) {
        self.flags.set(Flags::HAS_CHANGES, true);
    }

    /// Number of subtrees in this one, itself included.
    pub fn subtree_count(&self) -> usize {
        1 + self.children.iter().map(|child| child.subtree_count()).sum::<usize>()
    }
}

impl fmt::Debug for SubtreeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subtree")
            .field("symbol", &self.symbol)
            .field("padding", &self.padding)
            .field("size", &self.size)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}
