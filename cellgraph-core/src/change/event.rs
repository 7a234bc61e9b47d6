//! Event Chains
//!
//! A [`PropEvent`] is the observer-facing record of one node's change and
//! its cause: the event of the upstream node whose change produced it, and
//! so on back to the root cause (the mutator's write). Events are immutable
//! and shared via `Arc`, so a whole propagation's worth of events forms a
//! tree hanging off the root events.
//!
//! Each event also carries the set of every node on its causal chain. The
//! engine uses that set as a constant-time cycle probe: when propagation is
//! about to revisit a node that already appears on the causal chain leading
//! to it, that branch has looped and stops.

use std::collections::HashSet;
use std::sync::Arc;

use crate::change::Change;
use crate::graph::NodeId;

/// One node's change, linked to the event that caused it.
#[derive(Debug)]
pub struct PropEvent {
    node: NodeId,
    change: Change,
    cause: Option<Arc<PropEvent>>,
    chain: HashSet<NodeId>,
}

impl PropEvent {
    /// The root cause of a propagation: a mutator's direct write.
    pub fn root_cause(node: NodeId, change: Change) -> Arc<Self> {
        let mut chain = HashSet::new();
        chain.insert(node);
        Arc::new(Self {
            node,
            change,
            cause: None,
            chain,
        })
    }

    /// A consequential event caused by an upstream event.
    pub fn caused_by(node: NodeId, change: Change, cause: &Arc<PropEvent>) -> Arc<Self> {
        let mut chain = cause.chain.clone();
        chain.insert(node);
        Arc::new(Self {
            node,
            change,
            cause: Some(Arc::clone(cause)),
            chain,
        })
    }

    /// The node this event describes.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The node's change as recorded when the event was created.
    pub fn change(&self) -> Change {
        self.change
    }

    /// The immediate cause, if this is not a root event.
    pub fn cause(&self) -> Option<&Arc<PropEvent>> {
        self.cause.as_ref()
    }

    /// Is `node` anywhere on the causal chain of this event (itself
    /// included)?
    pub fn in_chain(&self, node: NodeId) -> bool {
        self.chain.contains(&node)
    }

    /// The number of events from here back to the root cause, inclusive.
    pub fn depth(&self) -> usize {
        self.causes().count()
    }

    /// The originating event of this chain.
    pub fn root(&self) -> &PropEvent {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Walk the chain from this event back to the root cause.
    pub fn causes(&self) -> Causes<'_> {
        Causes { next: Some(self) }
    }
}

/// Iterator over an event's causal chain, starting at the event itself.
pub struct Causes<'a> {
    next: Option<&'a PropEvent>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a PropEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.next?;
        self.next = event.cause.as_deref();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::graph::NodeArena;
    use crate::graph::Node;

    fn ids(n: usize) -> Vec<NodeId> {
        let mut arena = NodeArena::new();
        (0..n).map(|_| arena.insert(Node::value())).collect()
    }

    #[test]
    fn chain_walks_back_to_root() {
        let nodes = ids(3);
        let root = PropEvent::root_cause(nodes[0], Change::triggering(ChangeKind::Value, false));
        let mid = PropEvent::caused_by(nodes[1], Change::consequential(ChangeKind::Value), &root);
        let leaf = PropEvent::caused_by(nodes[2], Change::consequential(ChangeKind::Value), &mid);

        let walked: Vec<NodeId> = leaf.causes().map(|e| e.node()).collect();
        assert_eq!(walked, vec![nodes[2], nodes[1], nodes[0]]);
        assert_eq!(leaf.root().node(), nodes[0]);
        assert_eq!(leaf.depth(), 3);
    }

    #[test]
    fn chain_set_detects_ancestors() {
        let nodes = ids(3);
        let root = PropEvent::root_cause(nodes[0], Change::triggering(ChangeKind::Value, false));
        let leaf = PropEvent::caused_by(nodes[1], Change::consequential(ChangeKind::Value), &root);

        assert!(leaf.in_chain(nodes[0]));
        assert!(leaf.in_chain(nodes[1]));
        assert!(!leaf.in_chain(nodes[2]));
    }

    #[test]
    fn root_event_has_no_cause() {
        let nodes = ids(1);
        let root = PropEvent::root_cause(nodes[0], Change::triggering(ChangeKind::Value, true));
        assert!(root.cause().is_none());
        assert!(root.change().initial());
        assert_eq!(root.depth(), 1);
    }
}
