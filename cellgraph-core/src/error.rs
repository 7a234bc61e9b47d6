//! Error Types
//!
//! The core distinguishes two families of failures:
//!
//! - Programmer errors that would corrupt the shared propagation state if
//!   ignored (kind mismatches, unbalanced transaction pairs, concluding on
//!   the wrong thread). These are fatal to the current transaction and are
//!   surfaced as `GraphError` values that callers must not swallow.
//!
//! - Tolerated slips (removing a listener that was never added, a consumer's
//!   broken path cache). These are logged via `tracing` and degrade to a
//!   conservative answer instead of returning an error.
//!
//! Cycles in the listener graph are neither: they are a supported, designed
//! for case and never produce an error.

use thiserror::Error;

use crate::change::ChangeKind;
use crate::graph::NodeId;

/// Errors produced by the change-propagation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two changes with different declared kinds were merged. A node's
    /// declared kind is fixed for its lifetime, so this indicates a broken
    /// responder or a mutator driving the wrong change through a node.
    #[error("cannot extend a {existing:?} change with a {incoming:?} change")]
    ChangeKindMismatch {
        existing: ChangeKind,
        incoming: ChangeKind,
    },

    /// A node handle no longer resolves: the slot was freed (and possibly
    /// reused under a new generation) since the handle was taken.
    #[error("stale node handle {0:?}")]
    StaleNode(NodeId),

    /// `conclude_change` (or `conclude_listener_change`) was called without
    /// a matching prepare on this system.
    #[error("conclude called without a matching prepare")]
    UnbalancedConclude,

    /// `conclude_read` was called without a matching `prepare_read`.
    #[error("conclude_read called without a matching prepare_read")]
    UnbalancedRead,

    /// A write-side primitive was used on a thread that does not hold the
    /// write lock.
    #[error("operation requires the write lock held by the current thread")]
    NotWriteOwner,

    /// `propagate_change` was re-entered from inside a running propagation
    /// (for example from an `internal_change` hook). Hooks must return their
    /// own change instead of starting a new traversal.
    #[error("propagate_change re-entered while a propagation is in flight")]
    PropagationInProgress,
}
