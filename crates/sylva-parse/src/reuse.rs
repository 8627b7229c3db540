use rustc_hash::FxHashMap;
use sylva_grammar::Symbol;
use sylva_tree::{Range, Subtree, Tree};

/// Unchanged subtrees of an edited tree, keyed by where their padding starts
/// and by symbol.
#[derive(Default)]
pub(crate) struct ReuseIndex {
    subtrees: FxHashMap<(u32, Symbol), Subtree>,
    /// Byte spans whose included-range membership changed.
    stale: Vec<(u32, u32)>,
}

impl ReuseIndex {
    pub(crate) fn new(old: &Tree, included_ranges: &[Range]) -> Self {
        let program = old.grammar().program();
        let mut subtrees = FxHashMap::default();

        let mut stack = Vec::new();
        let mut start = 0;
        for child in old.root_subtree().children() {
            stack.push((child.clone(), start));
            start += u32::from(child.total_size().bytes);
        }
        while let Some((subtree, start)) = stack.pop() {
            if !subtree.has_changes() && !subtree.has_error() && program.entry(subtree.symbol()).is_some() {
                subtrees.entry((start, subtree.symbol())).or_insert_with(|| subtree.clone());
            }
            let mut child_start = start;
            for child in subtree.children() {
                stack.push((child.clone(), child_start));
                child_start += u32::from(child.total_size().bytes);
            }
        }

        let stale = stale_spans(old.included_ranges(), included_ranges);
        tracing::debug!(subtrees = subtrees.len(), stale = stale.len(), "indexed old tree");
        Self { subtrees, stale }
    }

    /// A subtree that can stand in for calling `symbol` at `position`.
    ///
    /// Only error-free subtrees qualify: they are exactly what a strict call
    /// would produce again from the same text.
    pub(crate) fn get(&self, position: u32, symbol: Symbol) -> Option<&Subtree> {
        let subtree = self.subtrees.get(&(position, symbol))?;
        if subtree.has_error() {
            return None;
        }
        let end = position
            .saturating_add(u32::from(subtree.total_size().bytes))
            .saturating_add(subtree.lookahead_bytes());
        let stale = self
            .stale
            .iter()
            .any(|&(start, stop)| start <= end && position < stop.max(start.saturating_add(1)));
        (!stale).then_some(subtree)
    }
}

/// Spans covered by a range in one list but not by an identical range in the
/// other.
fn stale_spans(old: &[Range], new: &[Range]) -> Vec<(u32, u32)> {
    let only_in = |ranges: &[Range], other: &[Range]| {
        ranges
            .iter()
            .filter(|range| !other.contains(range))
            .map(|range| (range.start_byte, range.end_byte))
            .collect::<Vec<_>>()
    };
    let mut stale = only_in(old, new);
    stale.extend(only_in(new, old));
    stale
}
