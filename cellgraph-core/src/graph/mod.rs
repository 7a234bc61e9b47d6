//! Listener Graph
//!
//! This module owns the storage side of the change-propagation core:
//!
//! - [`NodeArena`]: a generational slab holding every node in one system.
//!   Nodes are identified by stable [`NodeId`] handles; a handle to a freed
//!   slot stops resolving, which is how the core expresses weak
//!   back-references without garbage-collector support.
//!
//! - [`Node`]: the per-node record: declared change kind, changeable
//!   listener edges (other nodes to inform), observer listeners (external
//!   consumers), the node's [`ChangeResponder`], and string-keyed metadata.
//!
//! - [`Listeners`]: the identity-keyed, ordered listener set used for
//!   observer registrations.
//!
//! The traversal and transaction machinery lives in [`crate::engine`]; this
//! module only stores the graph.

mod arena;
mod listeners;
mod node;

pub use arena::{NodeArena, NodeId};
pub use listeners::Listeners;
pub use node::{ChangeObserver, ChangeResponder, Node, ValueResponder};
