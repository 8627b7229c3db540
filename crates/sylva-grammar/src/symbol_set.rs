use std::fmt;

use crate::Symbol;

const BITS_PER_SLOT: usize = u64::BITS as usize;

/// A bitset over the symbols of one grammar.
///
/// The set is sized for the grammar it was created for. [`ERROR_SYMBOL`] and
/// any other out-of-range symbol is never a member.
///
/// [`ERROR_SYMBOL`]: crate::ERROR_SYMBOL
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SymbolSet {
    bits: Box<[u64]>,
}

impl SymbolSet {
    pub fn with_capacity(symbol_count: usize) -> Self {
        Self { bits: vec![0; symbol_count.div_ceil(BITS_PER_SLOT)].into_boxed_slice() }
    }

    fn slot(symbol: Symbol) -> (usize, u64) {
        let symbol = usize::from(symbol);
        (symbol / BITS_PER_SLOT, 1 << (symbol % BITS_PER_SLOT))
    }

    /// Adds `symbol`, returning whether it was newly inserted.
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        let (slot, mask) = Self::slot(symbol);
        debug_assert!(slot < self.bits.len(), "symbol {symbol} is outside of the set's grammar");
        match self.bits.get_mut(slot) {
            Some(bits) if *bits & mask == 0 => {
                *bits |= mask;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        let (slot, mask) = Self::slot(symbol);
        self.bits.get(slot).is_some_and(|bits| bits & mask != 0)
    }

    /// Adds every member of `other`, returning whether anything changed.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (bits, other) in self.bits.iter_mut().zip(other.bits.iter()) {
            let merged = *bits | other;
            changed |= merged != *bits;
            *bits = merged;
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|bits| *bits == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.bits.iter().enumerate().flat_map(|(slot, &bits)| {
            (0..BITS_PER_SLOT).filter(move |bit| bits & (1 << bit) != 0).map(move |bit| {
                // Sets are sized from a `Symbol` count, so this never truncates.
                (slot * BITS_PER_SLOT + bit) as Symbol
            })
        })
    }
}

impl fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
