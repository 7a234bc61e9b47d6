//! Cellgraph Core
//!
//! This crate is the change-propagation core of the cellgraph
//! observable-property runtime. It implements:
//!
//! - Change descriptors and collection deltas (what changed, how much)
//! - The listener graph (arena-backed, cycle-tolerant)
//! - The propagation engine and its transaction discipline
//! - Batched dispatch to external observers
//! - A path-tracking consumer built on all of the above
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `change`: immutable change records, collection deltas, event chains
//! - `graph`: node storage, listener edges, the responder/observer contracts
//! - `engine`: the `ChangeSystem` (prepare/conclude transactions,
//!   `propagate_change`, dispatch queue and dispatchers)
//! - `path`: the worked consumer that caches a dependency chain
//!
//! # How a mutation flows
//!
//! 1. A mutator calls `prepare_change(node)` and edits the node's own
//!    primitive state.
//! 2. `propagate_change(node, change)` walks the changeable-listener
//!    graph, asking each reached node's responder for its own change and
//!    merging records when a node is reachable through several paths.
//!    Cycles and diamonds terminate because a merge that adds no new
//!    information stops that branch.
//! 3. `conclude_change(node)` releases the transaction; the outermost
//!    conclude freezes everything into one batch and delivers it to each
//!    interested observer exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use cellgraph_core::{Change, ChangeKind, ChangeSystem, Node};
//!
//! let system = ChangeSystem::new();
//! let source = system.insert_node(Node::value());
//! let derived = system.insert_node(Node::value());
//! system.add_changeable_listener(source, derived)?;
//!
//! system.prepare_change(source);
//! // ... mutate the value backing `source` ...
//! system.propagate_change(source, Change::triggering(ChangeKind::Value, false))?;
//! system.conclude_change(source)?;
//! ```

pub mod change;
pub mod engine;
pub mod error;
pub mod graph;
pub mod path;

pub use change::{Change, ChangeKind, Causes, DeltaKind, ListDelta, MapDelta, PropEvent, SetDelta};
pub use engine::{
    ChangeBatch, ChangeSystem, DispatchPair, Dispatcher, InlineDispatcher, MarshalledDispatcher,
    PropagationView, ReadTxn, Snapshot, SystemListener, WriteTxn,
};
pub use error::GraphError;
pub use graph::{ChangeObserver, ChangeResponder, Listeners, Node, NodeArena, NodeId, ValueResponder};
pub use path::{CacheState, PathStep, TrackedPath};
