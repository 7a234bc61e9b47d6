//! Propagation Engine
//!
//! The engine is the heart of the core: given one mutated node, it walks
//! the changeable-listener graph, asks every reached node's responder for
//! its own change, merges changes when a node is reachable through several
//! paths, terminates on cycles, and hands the settled result to the
//! dispatch layer as one atomic batch.
//!
//! # Pieces
//!
//! - [`ChangeSystem`]: the transaction primitives
//!   (`prepare_change`/`conclude_change`, reads, listener changes) and the
//!   traversal itself ([`ChangeSystem::propagate_change`]).
//! - [`Snapshot`] / [`PropagationView`]: the working state of one top-level
//!   transaction and the read-only view responders see.
//! - [`ChangeBatch`], [`Dispatcher`]: batch assembly and delivery, inline
//!   or marshalled onto a dedicated delivery thread.

mod dispatch;
mod snapshot;
mod system;

pub use dispatch::{
    ChangeBatch, DispatchPair, Dispatcher, InlineDispatcher, MarshalledDispatcher,
};
pub use snapshot::{PropagationView, Snapshot};
pub use system::{ChangeSystem, ReadTxn, SystemListener, WriteTxn};
