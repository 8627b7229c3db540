//! Concrete syntax trees for the Sylva parsing engine.
//!
//! A [`Tree`] is persistent: edits and reparses share every subtree they
//! don't touch. [`Node`] and [`TreeCursor`] borrow the tree they look at.

mod builder;
mod changed;
mod cursor;
mod edit;
mod length;
mod node;
mod sexp;
mod subtree;
mod tree;
mod walk;

pub use builder::{Leaf, TreeBuilder};
pub use cursor::TreeCursor;
pub use edit::{EditError, InputEdit};
pub use length::{Length, Point, Range};
pub use node::{Children, Node};
pub use subtree::{Subtree, SubtreeData};
pub use text_size::{TextRange, TextSize};
pub use tree::Tree;
pub use walk::{Preorder, WalkEvent};
