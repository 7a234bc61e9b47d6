//! Change Descriptors
//!
//! This module defines the immutable values that describe *what* changed:
//!
//! - [`Change`]: the per-node merged change record. Two bits of information
//!   (was this the triggering change, and are reference identities
//!   guaranteed unchanged) plus the node's declared kind.
//!
//! - [`ListDelta`], [`MapDelta`], [`SetDelta`]: the scope of one structural
//!   collection edit. Collection implementations derive these after
//!   mutating their storage and drive them through the engine.
//!
//! - [`PropEvent`]: the observer-facing causality chain ("this node changed
//!   because that one changed, because ...").
//!
//! All of these values may *overstate* a change (report a wider index range,
//! fall back to a complete change, drop a `same_instances` guarantee) but
//! must never understate one. Downstream consumers rely on that direction:
//! an overstated change costs redundant work, an understated one costs
//! correctness.

mod change;
mod delta;
mod event;

pub use change::{Change, ChangeKind};
pub use delta::{DeltaKind, ListDelta, MapDelta, SetDelta};
pub use event::{Causes, PropEvent};
