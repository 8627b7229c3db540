use drop_bomb::DropBomb;
use sylva_grammar::{FieldId, Grammar, Symbol};
use sylva_tree::{Leaf, Subtree, TreeBuilder};

/// What the machine did, in order. Backtracking truncates the log, so it only
/// ever describes the path that is still alive.
#[derive(Clone, Debug)]
pub(crate) enum Event {
    Start { symbol: Symbol, field: Option<FieldId> },
    Token { leaf: Leaf, field: Option<FieldId> },
    Missing { symbol: Symbol, field: Option<FieldId> },
    Reuse { subtree: Subtree, field: Option<FieldId> },
    /// `lookahead_end` is the furthest absolute byte examined while the node
    /// was parsed.
    Finish { lookahead_end: u32 },
    Tombstone,
}

/// An open node whose kind is decided when it is completed.
pub(crate) struct Marker {
    position: usize,
    bomb: DropBomb,
}

impl Marker {
    pub(crate) fn start(events: &mut Vec<Event>) -> Self {
        let position = events.len();
        events.push(Event::Tombstone);
        Self { position, bomb: DropBomb::new("Marker must be either completed or abandoned") }
    }

    pub(crate) fn complete(mut self, events: &mut Vec<Event>, symbol: Symbol, lookahead_end: u32) {
        self.bomb.defuse();
        match &mut events[self.position] {
            slot @ Event::Tombstone => *slot = Event::Start { symbol, field: None },
            _ => unreachable!(),
        }
        events.push(Event::Finish { lookahead_end });
    }

    /// Drops the marker. Anything pushed since it was started stays in the
    /// enclosing node.
    pub(crate) fn abandon(mut self, events: &[Event]) {
        self.bomb.defuse();
        debug_assert!(matches!(events[self.position], Event::Tombstone));
    }
}

pub(crate) fn build_tree(grammar: &Grammar, events: Vec<Event>) -> Subtree {
    let mut builder = TreeBuilder::new(grammar);
    for event in events {
        match event {
            Event::Start { symbol, field } => builder.start_node(symbol, field),
            Event::Token { leaf, field } => builder.token(leaf, field),
            Event::Missing { symbol, field } => builder.missing(symbol, field),
            Event::Reuse { subtree, field } => builder.reuse(subtree, field),
            Event::Finish { lookahead_end } => builder.finish_node(lookahead_end),
            Event::Tombstone => {}
        }
    }
    builder.finish()
}
