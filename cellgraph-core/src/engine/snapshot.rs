//! Propagation Snapshot
//!
//! One [`Snapshot`] exists per top-level write transaction. It accumulates:
//!
//! - the ordered list of *initial* roots (nodes the mutator wrote
//!   directly),
//! - the merged change per affected node, in the order nodes were first
//!   reached (insertion-ordered, so dispatch order is deterministic),
//! - the set of nodes that answered "unaffected" (never re-asked within
//!   the same propagation),
//! - the event chain of every affected node.
//!
//! Nested mutations within the same top-level transaction append into the
//! same snapshot. The outermost `conclude_change` freezes it into a
//! [`crate::engine::ChangeBatch`] and discards it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::change::{Change, PropEvent};
use crate::graph::NodeId;

/// Working state of one top-level write transaction.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub(crate) initial: Vec<NodeId>,
    pub(crate) changes: IndexMap<NodeId, Change>,
    pub(crate) unaffected: HashSet<NodeId>,
    pub(crate) events: HashMap<NodeId, Arc<PropEvent>>,
}

impl Snapshot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The initial roots, in the order they were written.
    pub fn initial(&self) -> &[NodeId] {
        &self.initial
    }

    /// The merged change per affected node, in first-reached order.
    pub fn changes(&self) -> &IndexMap<NodeId, Change> {
        &self.changes
    }

    /// Has anything changed in this transaction?
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn view(&self) -> PropagationView<'_> {
        PropagationView { snapshot: self }
    }
}

/// Read-only view of the snapshot handed to responders during propagation.
///
/// A responder sees the monotonically growing set of changes merged so far
/// in this pass; re-visits only ever extend that view, never regress it.
#[derive(Debug, Clone, Copy)]
pub struct PropagationView<'a> {
    pub(crate) snapshot: &'a Snapshot,
}

impl<'a> PropagationView<'a> {
    /// The initial roots recorded so far.
    pub fn initial(&self) -> &'a [NodeId] {
        &self.snapshot.initial
    }

    /// All changes merged so far, in first-reached order.
    pub fn changes(&self) -> &'a IndexMap<NodeId, Change> {
        &self.snapshot.changes
    }

    /// The change merged so far for one node, if it was reached.
    pub fn change_of(&self, node: NodeId) -> Option<Change> {
        self.snapshot.changes.get(&node).copied()
    }

    /// Was this node written directly by the mutator?
    pub fn is_initial(&self, node: NodeId) -> bool {
        self.snapshot.initial.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::graph::{Node, NodeArena};

    #[test]
    fn view_reflects_recorded_changes() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::value());
        let b = arena.insert(Node::value());

        let mut snapshot = Snapshot::new();
        let change = Change::triggering(ChangeKind::Value, false);
        snapshot.initial.push(a);
        snapshot.changes.insert(a, change);

        let view = snapshot.view();
        assert_eq!(view.change_of(a), Some(change));
        assert_eq!(view.change_of(b), None);
        assert!(view.is_initial(a));
        assert!(!view.is_initial(b));
        assert_eq!(view.initial(), &[a]);
    }
}
