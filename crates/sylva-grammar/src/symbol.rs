//! Symbol and field identifiers.

use std::num::NonZeroU16;

/// Numeric identifier of a grammar symbol.
///
/// Symbol `0` is the end-of-input marker and [`ERROR_SYMBOL`] is reserved for
/// error nodes. Every other symbol is assigned by the grammar in declaration
/// order starting at `1`.
pub type Symbol = u16;

/// Numeric identifier of a field name. Field ids start at `1`.
pub type FieldId = NonZeroU16;

/// The end-of-input symbol.
pub const END_SYMBOL: Symbol = 0;

/// The symbol carried by `ERROR` nodes.
pub const ERROR_SYMBOL: Symbol = Symbol::MAX;

/// How a symbol shows up in syntax trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolType {
    /// Named and visible, e.g. `identifier`.
    Regular,
    /// Visible but unnamed, e.g. the literal `"+"`.
    Anonymous,
    /// Never shown as a node; its children are spliced into the parent.
    Auxiliary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub name: Box<str>,
    pub named: bool,
    pub visible: bool,
}

impl SymbolMetadata {
    pub(crate) fn new(name: impl Into<Box<str>>, named: bool, visible: bool) -> Self {
        Self { name: name.into(), named, visible }
    }

    pub fn symbol_type(&self) -> SymbolType {
        match (self.visible, self.named) {
            (true, true) => SymbolType::Regular,
            (true, false) => SymbolType::Anonymous,
            (false, _) => SymbolType::Auxiliary,
        }
    }
}
