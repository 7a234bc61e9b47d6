//! Node Records and Contracts
//!
//! A [`Node`] is one vertex of the listener graph. It stores:
//!
//! - the node's declared [`ChangeKind`] (fixed for its lifetime),
//! - its changeable listeners: handles of the nodes to inform when it
//!   changes (plus the reverse edges, for cheap unlinking),
//! - its observer listeners: external consumers that receive dispatched
//!   batches after a propagation settles,
//! - its [`ChangeResponder`], the hook the engine asks "given this upstream
//!   change, what is *your* change?",
//! - string-keyed metadata annotations (for collaborators such as an undo
//!   layer marking a node transient; the engine never reads them).
//!
//! The engine is generic over the [`ChangeResponder`] and
//! [`ChangeObserver`] traits only; it never knows concrete node types.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::change::{Change, ChangeKind};
use crate::engine::{ChangeBatch, PropagationView};

use super::arena::NodeId;
use super::listeners::Listeners;

/// The per-node hook that computes a node's own change from an upstream
/// change. Every node kind (value cell, list, computed property, path
/// tracker, ...) supplies one implementation.
pub trait ChangeResponder: Send + Sync {
    /// The kind of change this node emits. Fixed for the node's lifetime.
    fn change_kind(&self) -> ChangeKind {
        ChangeKind::Value
    }

    /// `source` changed with `source_change`; `view` exposes the initial
    /// roots and every change merged so far in this propagation.
    ///
    /// Return `None` to report "unaffected" (propagation does not continue
    /// through this node, and the hook is not re-invoked this propagation),
    /// or `Some(change)` describing this node's own resulting change. The
    /// returned change may overstate, never understate.
    ///
    /// The hook must not mutate unrelated graph state and must not start a
    /// nested propagation; it may maintain its own private state (caches).
    fn internal_change(
        &self,
        source: NodeId,
        source_change: Change,
        view: &PropagationView<'_>,
    ) -> Option<Change>;
}

/// External consumer of dispatched change batches.
///
/// One call per dispatch batch per observer, regardless of how many of the
/// observer's nodes changed in that batch.
pub trait ChangeObserver: Send + Sync {
    fn changed(&self, batch: &ChangeBatch);
}

/// The default responder for a plain value cell: any upstream change makes
/// this node report a consequential deep change (its own identity intact).
#[derive(Debug, Default)]
pub struct ValueResponder;

impl ChangeResponder for ValueResponder {
    fn internal_change(
        &self,
        _source: NodeId,
        _source_change: Change,
        _view: &PropagationView<'_>,
    ) -> Option<Change> {
        Some(Change::consequential(ChangeKind::Value))
    }
}

/// One vertex of the listener graph.
pub struct Node {
    kind: ChangeKind,
    responder: Arc<dyn ChangeResponder>,
    listeners: SmallVec<[NodeId; 4]>,
    sources: SmallVec<[NodeId; 4]>,
    observers: Listeners<dyn ChangeObserver>,
    metadata: HashMap<String, String>,
}

impl Node {
    /// A node driven by the given responder; the declared kind is taken
    /// from the responder.
    pub fn with_responder(responder: Arc<dyn ChangeResponder>) -> Self {
        Self {
            kind: responder.change_kind(),
            responder,
            listeners: SmallVec::new(),
            sources: SmallVec::new(),
            observers: Listeners::new(),
            metadata: HashMap::new(),
        }
    }

    /// A plain value cell.
    pub fn value() -> Self {
        Self::with_responder(Arc::new(ValueResponder))
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn responder(&self) -> Arc<dyn ChangeResponder> {
        Arc::clone(&self.responder)
    }

    /// Handles of the nodes listening to this one.
    pub fn changeable_listeners(&self) -> &[NodeId] {
        &self.listeners
    }

    /// Handles of the nodes this one listens to.
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn observers(&self) -> &Listeners<dyn ChangeObserver> {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut Listeners<dyn ChangeObserver> {
        &mut self.observers
    }

    pub(crate) fn add_listener(&mut self, listener: NodeId) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    pub(crate) fn remove_listener(&mut self, listener: NodeId) -> bool {
        match self.listeners.iter().position(|&id| id == listener) {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn add_source(&mut self, source: NodeId) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    pub(crate) fn remove_source(&mut self, source: NodeId) -> bool {
        match self.sources.iter().position(|&id| id == source) {
            Some(index) => {
                self.sources.remove(index);
                true
            }
            None => false,
        }
    }

    /// Look up a metadata annotation.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Set a metadata annotation, returning the previous value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.metadata.insert(key.into(), value.into())
    }

    /// Remove a metadata annotation, returning its value.
    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("listeners", &self.listeners)
            .field("sources", &self.sources)
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeArena;

    #[test]
    fn value_node_declares_value_kind() {
        let node = Node::value();
        assert_eq!(node.kind(), ChangeKind::Value);
        assert!(node.changeable_listeners().is_empty());
        assert!(node.observers().is_empty());
    }

    #[test]
    fn kind_comes_from_the_responder() {
        struct ListResponder;
        impl ChangeResponder for ListResponder {
            fn change_kind(&self) -> ChangeKind {
                ChangeKind::List
            }
            fn internal_change(
                &self,
                _source: NodeId,
                _source_change: Change,
                _view: &PropagationView<'_>,
            ) -> Option<Change> {
                Some(Change::consequential(ChangeKind::List))
            }
        }

        let node = Node::with_responder(Arc::new(ListResponder));
        assert_eq!(node.kind(), ChangeKind::List);
    }

    #[test]
    fn duplicate_edges_are_no_ops() {
        let mut arena = NodeArena::new();
        let other = arena.insert(Node::value());

        let mut node = Node::value();
        node.add_listener(other);
        node.add_listener(other);
        assert_eq!(node.changeable_listeners().len(), 1);

        assert!(node.remove_listener(other));
        assert!(!node.remove_listener(other));
    }

    #[test]
    fn metadata_round_trip() {
        let mut node = Node::value();
        assert_eq!(node.set_metadata("transient", "true"), None);
        assert_eq!(node.metadata("transient"), Some("true"));
        assert_eq!(
            node.set_metadata("transient", "false"),
            Some("true".to_string())
        );
        assert_eq!(node.remove_metadata("transient"), Some("false".to_string()));
        assert_eq!(node.metadata("transient"), None);
    }
}
