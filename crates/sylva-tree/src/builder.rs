//! Assembles subtrees from parser events.

use sylva_grammar::{ERROR_SYMBOL, FieldId, Grammar, Symbol};
use triomphe::Arc;

use crate::subtree::{Flags, Subtree, SubtreeData};
use crate::Length;

/// A lexed token as handed to the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub symbol: Symbol,
    pub padding: Length,
    pub size: Length,
    pub lookahead_bytes: u32,
    pub is_extra: bool,
}

struct Opened {
    symbol: Symbol,
    field: Option<FieldId>,
    children: Vec<Subtree>,
    fields: Vec<Option<FieldId>>,
}

/// Builds a [`Subtree`] from a well-nested sequence of `start_node`,
/// `token`, `missing`, `reuse` and `finish_node` calls.
pub struct TreeBuilder<'g> {
    grammar: &'g Grammar,
    opened: Vec<Opened>,
    children_pool: Vec<(Vec<Subtree>, Vec<Option<FieldId>>)>,
    /// Absolute end of everything added so far.
    position: Length,
    root: Option<Subtree>,
}

impl Drop for TreeBuilder<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.opened.is_empty() {
            panic!("you should call `TreeBuilder::finish()`");
        }
    }
}

const DEFAULT_TREE_DEPTH: usize = 64;
const DEFAULT_CHILDREN_LEN: usize = 8;

impl<'g> TreeBuilder<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            opened: Vec::with_capacity(DEFAULT_TREE_DEPTH),
            children_pool: Vec::with_capacity(DEFAULT_TREE_DEPTH),
            position: Length::ZERO,
            root: None,
        }
    }

    pub fn position(&self) -> Length {
        self.position
    }

    pub fn start_node(&mut self, symbol: Symbol, field: Option<FieldId>) {
        let (children, fields) = self.children_pool.pop().unwrap_or_else(|| {
            (Vec::with_capacity(DEFAULT_CHILDREN_LEN), Vec::with_capacity(DEFAULT_CHILDREN_LEN))
        });
        self.opened.push(Opened { symbol, field, children, fields });
    }

    /// Finishes the innermost node. `lookahead_end` is the furthest absolute
    /// byte the parser examined while building it.
    pub fn finish_node(&mut self, lookahead_end: u32) {
        let Opened { symbol, field, mut children, mut fields } =
            self.opened.pop().expect("no opened nodes?");

        let mut padding = Length::ZERO;
        let mut total = Length::ZERO;
        let mut children_lookahead_end = 0;
        let mut visible_child_count = 0;
        let mut named_child_count = 0;
        let mut has_error = symbol == ERROR_SYMBOL;
        for (index, child) in children.iter().enumerate() {
            if index == 0 {
                padding = child.padding;
            }
            total += child.total_size();
            children_lookahead_end =
                children_lookahead_end.max(u32::from(total.bytes) + child.lookahead_bytes);
            if child.is_visible() {
                visible_child_count += 1;
                named_child_count += u32::from(child.is_named());
            } else {
                visible_child_count += child.visible_child_count;
                named_child_count += child.named_child_count;
            }
            has_error |= child.has_error();
        }
        let start = u32::from(self.position.bytes).saturating_sub(u32::from(total.bytes));
        let lookahead_end = lookahead_end.saturating_sub(start).max(children_lookahead_end);

        let node = SubtreeData {
            symbol,
            flags: self.flags(symbol, false, false, has_error),
            padding,
            size: total - padding,
            lookahead_bytes: lookahead_end.saturating_sub(u32::from(total.bytes)),
            visible_child_count,
            named_child_count,
            children: children.drain(..).collect(),
            fields: fields.iter().any(Option::is_some).then(|| fields.iter().copied().collect()),
        };
        fields.clear();
        self.children_pool.push((children, fields));
        self.push(Arc::new(node), field);
    }

    pub fn token(&mut self, leaf: Leaf, field: Option<FieldId>) {
        self.position += leaf.padding + leaf.size;
        let mut flags = self.flags(leaf.symbol, leaf.is_extra, false, leaf.symbol == ERROR_SYMBOL);
        if leaf.symbol == ERROR_SYMBOL {
            // Unrecognized text is folded into the enclosing error node.
            flags.set(Flags::VISIBLE, false);
        }
        let node = SubtreeData {
            symbol: leaf.symbol,
            flags,
            padding: leaf.padding,
            size: leaf.size,
            lookahead_bytes: leaf.lookahead_bytes,
            visible_child_count: 0,
            named_child_count: 0,
            children: Box::default(),
            fields: None,
        };
        self.push(Arc::new(node), field);
    }

    /// Adds a zero-width token the input should have contained.
    pub fn missing(&mut self, symbol: Symbol, field: Option<FieldId>) {
        let node = SubtreeData {
            symbol,
            flags: self.flags(symbol, false, true, true),
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 0,
            visible_child_count: 0,
            named_child_count: 0,
            children: Box::default(),
            fields: None,
        };
        self.push(Arc::new(node), field);
    }

    /// Adds a subtree from a previous tree unchanged.
    pub fn reuse(&mut self, subtree: Subtree, field: Option<FieldId>) {
        self.position += subtree.total_size();
        self.push(subtree, field);
    }

    pub fn finish(mut self) -> Subtree {
        assert!(self.opened.is_empty(), "unfinished nodes");
        self.root.take().expect("no root node")
    }

    fn flags(&self, symbol: Symbol, extra: bool, missing: bool, has_error: bool) -> Flags {
        let (named, visible) = self
            .grammar
            .symbol_metadata(symbol)
            .map_or((false, false), |metadata| (metadata.named, metadata.visible));
        let mut flags = Flags::default();
        flags.set(Flags::NAMED, named);
        flags.set(Flags::VISIBLE, visible);
        flags.set(Flags::EXTRA, extra);
        flags.set(Flags::MISSING, missing);
        flags.set(Flags::HAS_ERROR, has_error);
        flags
    }

    fn push(&mut self, subtree: Subtree, field: Option<FieldId>) {
        match self.opened.last_mut() {
            Some(parent) => {
                parent.children.push(subtree);
                parent.fields.push(field);
            }
            None => self.root = Some(subtree),
        }
    }
}
