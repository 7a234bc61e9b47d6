//! Change System
//!
//! [`ChangeSystem`] is the propagation engine plus the transaction
//! discipline every mutator and reader goes through. One system owns one
//! node arena, one dispatch queue, and one write-state record; there are
//! no process-wide statics, so tests can run any number of independent
//! systems.
//!
//! # Transaction discipline
//!
//! A mutation is bracketed by `prepare_change` / `conclude_change`:
//!
//! 1. `prepare_change(node)` acquires the system-wide write lock. The lock
//!    is reentrant for the owning thread via a depth counter, so a
//!    computed property reacting synchronously inside the same logical
//!    transaction nests without deadlock and shares the same snapshot.
//! 2. The caller mutates the node's own primitive state directly.
//! 3. `propagate_change(node, change)` walks the changeable-listener graph
//!    and merges every reached node's resulting change into the snapshot.
//! 4. `conclude_change(node)` releases one lock level. The outermost
//!    conclude freezes the snapshot into a batch, releases ownership, and
//!    only then flushes the dispatch queue, so observers never see a
//!    partial transaction.
//!
//! Reads go through `prepare_read` / `conclude_read`: shared among
//! readers, excluded by a write from a *different* thread, and immediate
//! on the thread that holds the write lock. A read held by the current
//! thread cannot be upgraded: conclude it before preparing a write.
//!
//! Listener-set mutation goes through `prepare_listener_change` /
//! `conclude_listener_change` (same exclusion, no snapshot), so a
//! propagation never iterates a listener list that is being edited.
//!
//! # Traversal
//!
//! The traversal is iterative over a frontier of (target, source, change)
//! entries, never recursive, so cycles cannot overflow the stack. Two
//! rules bound it:
//!
//! - An edge that brings no new information (the target's recorded change
//!   already covers it) stops; the change lattice has height 3, so a node
//!   is re-asked at most that many times regardless of graph size.
//! - A branch that loops back onto its own causal chain stops.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use smallvec::SmallVec;

use crate::change::{Change, ChangeKind, PropEvent};
use crate::error::GraphError;
use crate::graph::{ChangeObserver, Listeners, Node, NodeArena, NodeId};

use super::dispatch::{ChangeBatch, DispatchPair, DispatchQueue, Dispatcher, InlineDispatcher};
use super::snapshot::Snapshot;

/// Hooks fired at the boundaries of each top-level write transaction.
///
/// This is the contract an undo layer consumes: snapshot pre-state on
/// `change_prepared`, post-state on `change_concluded`. Implementations
/// must not start their own write transaction from inside a hook.
pub trait SystemListener: Send + Sync {
    fn change_prepared(&self, node: NodeId) {
        let _ = node;
    }

    fn change_concluded(&self, node: NodeId) {
        let _ = node;
    }
}

/// Who holds the write lock, how deep, and the transaction's snapshot.
#[derive(Default)]
struct WriteState {
    owner: Option<ThreadId>,
    depth: usize,
    readers: usize,
    propagating: bool,
    snapshot: Option<Snapshot>,
}

struct SystemInner {
    state: Mutex<WriteState>,
    quiesced: Condvar,
    arena: RwLock<NodeArena>,
    queue: DispatchQueue,
    /// Held while the queue is drained: batches of consecutive
    /// transactions must not interleave mid-delivery.
    flushing: Mutex<()>,
    dispatcher: RwLock<Arc<dyn Dispatcher>>,
    txn_listeners: Mutex<Listeners<dyn SystemListener>>,
}

/// The propagation engine and transaction coordinator.
///
/// Cloning a `ChangeSystem` yields another handle to the same system.
pub struct ChangeSystem {
    inner: Arc<SystemInner>,
}

impl Clone for ChangeSystem {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for ChangeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSystem {
    /// A fresh system with an empty graph and the inline dispatcher.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SystemInner {
                state: Mutex::new(WriteState::default()),
                quiesced: Condvar::new(),
                arena: RwLock::new(NodeArena::new()),
                queue: DispatchQueue::new(),
                flushing: Mutex::new(()),
                dispatcher: RwLock::new(Arc::new(InlineDispatcher)),
                txn_listeners: Mutex::new(Listeners::new()),
            }),
        }
    }

    /// Swap the delivery strategy for dispatch batches. Takes effect for
    /// the next flush.
    pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        *self.inner.dispatcher.write() = dispatcher;
    }

    // ------------------------------------------------------------------
    // Transaction primitives
    // ------------------------------------------------------------------

    /// Enter a write transaction on `node`. Blocks until no other thread
    /// holds the write lock and no reads are in flight; reentrant for the
    /// thread that already holds it.
    pub fn prepare_change(&self, node: NodeId) {
        let outermost = self.acquire_write(true);
        if outermost {
            for listener in self.inner.txn_listeners.lock().snapshot() {
                listener.change_prepared(node);
            }
        }
    }

    /// Leave one level of the write transaction. The outermost conclude
    /// freezes the snapshot, releases the lock, and flushes the dispatch
    /// queue.
    pub fn conclude_change(&self, node: NodeId) -> Result<(), GraphError> {
        self.conclude_write(node, true)
    }

    /// Enter a read. Shared with other readers; excluded by a write held
    /// on a different thread; immediate on the write-owner thread.
    pub fn prepare_read(&self, _node: NodeId) {
        let me = thread::current().id();
        let mut st = self.inner.state.lock();
        loop {
            match st.owner {
                Some(owner) if owner == me => {
                    st.readers += 1;
                    return;
                }
                None => {
                    st.readers += 1;
                    return;
                }
                Some(_) => self.inner.quiesced.wait(&mut st),
            }
        }
    }

    /// Leave a read.
    pub fn conclude_read(&self, _node: NodeId) -> Result<(), GraphError> {
        let mut st = self.inner.state.lock();
        if st.readers == 0 {
            return Err(GraphError::UnbalancedRead);
        }
        st.readers -= 1;
        if st.readers == 0 {
            self.inner.quiesced.notify_all();
        }
        Ok(())
    }

    /// Enter a listener-set mutation. Same exclusion as a write
    /// transaction, but no snapshot is created and no transaction hooks
    /// fire.
    pub fn prepare_listener_change(&self, _node: NodeId) {
        self.acquire_write(false);
    }

    /// Leave a listener-set mutation.
    pub fn conclude_listener_change(&self, node: NodeId) -> Result<(), GraphError> {
        self.conclude_write(node, false)
    }

    /// Bracketed write transaction: prepares on construction, concludes on
    /// drop.
    pub fn write(&self, node: NodeId) -> WriteTxn {
        self.prepare_change(node);
        WriteTxn {
            system: self.clone(),
            node,
            _not_send: PhantomData,
        }
    }

    /// Bracketed read: prepares on construction, concludes on drop.
    pub fn read(&self, node: NodeId) -> ReadTxn {
        self.prepare_read(node);
        ReadTxn {
            system: self.clone(),
            node,
            _not_send: PhantomData,
        }
    }

    fn acquire_write(&self, create_snapshot: bool) -> bool {
        let me = thread::current().id();
        let mut st = self.inner.state.lock();
        loop {
            match st.owner {
                Some(owner) if owner == me => {
                    st.depth += 1;
                    if create_snapshot && st.snapshot.is_none() && !st.propagating {
                        st.snapshot = Some(Snapshot::new());
                    }
                    return false;
                }
                None if st.readers == 0 => {
                    st.owner = Some(me);
                    st.depth = 1;
                    if create_snapshot {
                        st.snapshot = Some(Snapshot::new());
                    }
                    return true;
                }
                _ => self.inner.quiesced.wait(&mut st),
            }
        }
    }

    fn conclude_write(&self, node: NodeId, fire_hooks: bool) -> Result<(), GraphError> {
        let me = thread::current().id();
        let snapshot = {
            let mut st = self.inner.state.lock();
            match st.owner {
                Some(owner) if owner == me => {}
                Some(_) => return Err(GraphError::NotWriteOwner),
                None => return Err(GraphError::UnbalancedConclude),
            }
            if st.depth > 1 {
                st.depth -= 1;
                return Ok(());
            }
            // Outermost: take the snapshot but keep ownership while the
            // batch is assembled, so listener sets cannot shift under it.
            st.snapshot.take()
        };

        if let Some(snapshot) = snapshot {
            if !snapshot.is_empty() {
                let pairs = self.build_pairs(snapshot);
                if !pairs.is_empty() {
                    self.inner.queue.push(pairs);
                }
            }
        }

        {
            let mut st = self.inner.state.lock();
            st.depth = 0;
            st.owner = None;
            self.inner.quiesced.notify_all();
        }

        // Global quiescence for this transaction: flush outside every lock.
        self.flush();

        if fire_hooks {
            for listener in self.inner.txn_listeners.lock().snapshot() {
                listener.change_concluded(node);
            }
        }
        Ok(())
    }

    fn release_internal(&self, node: NodeId) {
        if let Err(err) = self.conclude_write(node, false) {
            tracing::error!(?err, "internal transaction imbalance");
        }
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Record `node` as an initial root with `change` and walk the
    /// changeable-listener graph until it settles.
    ///
    /// Requires the write lock held by the current thread. The whole
    /// traversal completes before this returns; nothing is dispatched
    /// until the outermost `conclude_change`.
    pub fn propagate_change(&self, node: NodeId, change: Change) -> Result<(), GraphError> {
        let me = thread::current().id();
        let mut snapshot = {
            let mut st = self.inner.state.lock();
            if st.owner != Some(me) {
                return Err(GraphError::NotWriteOwner);
            }
            if st.propagating {
                return Err(GraphError::PropagationInProgress);
            }
            st.propagating = true;
            st.snapshot.take().unwrap_or_default()
        };

        let result = self.traverse(&mut snapshot, node, change);

        let mut st = self.inner.state.lock();
        st.snapshot = Some(snapshot);
        st.propagating = false;
        result
    }

    fn traverse(
        &self,
        snap: &mut Snapshot,
        root: NodeId,
        change: Change,
    ) -> Result<(), GraphError> {
        let (root_kind, root_listeners) = {
            let arena = self.inner.arena.read();
            let node = arena.get(root).ok_or(GraphError::StaleNode(root))?;
            let listeners: SmallVec<[NodeId; 4]> =
                node.changeable_listeners().iter().copied().collect();
            (node.kind(), listeners)
        };
        if change.kind() != root_kind {
            return Err(GraphError::ChangeKindMismatch {
                existing: root_kind,
                incoming: change.kind(),
            });
        }

        // Merge the direct write into the snapshot.
        let merged_root = match snap.changes.get(&root).copied() {
            Some(existing) => change.extend(existing)?.unwrap_or(existing),
            None => change,
        };
        snap.changes.insert(root, merged_root);
        // A direct write overrides an earlier "unaffected" answer.
        snap.unaffected.remove(&root);
        if !snap.initial.contains(&root) {
            snap.initial.push(root);
        }
        snap.events.insert(root, PropEvent::root_cause(root, merged_root));

        let mut frontier: VecDeque<(NodeId, NodeId, Change)> = VecDeque::new();
        for listener in root_listeners {
            frontier.push_back((listener, root, merged_root));
        }

        while let Some((target, source, source_change)) = frontier.pop_front() {
            if snap.unaffected.contains(&target) {
                continue;
            }

            let source_event = snap.events.get(&source).cloned();
            if let Some(ref event) = source_event {
                if event.in_chain(target) {
                    tracing::trace!(?target, ?source, "branch looped back, stopping");
                    continue;
                }
            }

            let (target_kind, responder) = {
                let arena = self.inner.arena.read();
                match arena.get(target) {
                    Some(node) => (node.kind(), node.responder()),
                    // Listener disappeared mid-transaction; tolerated.
                    None => continue,
                }
            };

            // Does this edge carry any information the target's record
            // does not already cover?
            let probe = Change::instance(target_kind, false, source_change.same_instances());
            if let Some(existing) = snap.changes.get(&target).copied() {
                if probe.extend(existing)?.is_none() {
                    continue;
                }
            }

            let own = {
                let view = snap.view();
                responder.internal_change(source, source_change, &view)
            };
            let own = match own {
                Some(own) => own,
                None => {
                    if !snap.changes.contains_key(&target) {
                        snap.unaffected.insert(target);
                    }
                    continue;
                }
            };
            if own.kind() != target_kind {
                return Err(GraphError::ChangeKindMismatch {
                    existing: target_kind,
                    incoming: own.kind(),
                });
            }

            let merged = match snap.changes.get(&target).copied() {
                Some(existing) => match own.extend(existing)? {
                    Some(merged) => merged,
                    // The hook reported nothing beyond what is recorded.
                    None => continue,
                },
                None => own,
            };
            snap.changes.insert(target, merged);
            let event = match source_event {
                Some(ref cause) => PropEvent::caused_by(target, merged, cause),
                None => PropEvent::root_cause(target, merged),
            };
            snap.events.insert(target, event);

            let listeners: SmallVec<[NodeId; 4]> = {
                let arena = self.inner.arena.read();
                arena
                    .get(target)
                    .map(|node| node.changeable_listeners().iter().copied().collect())
                    .unwrap_or_default()
            };
            for listener in listeners {
                frontier.push_back((listener, target, merged));
            }
        }
        Ok(())
    }

    fn build_pairs(&self, snapshot: Snapshot) -> Vec<DispatchPair> {
        let Snapshot {
            initial,
            changes,
            events,
            ..
        } = snapshot;
        let ordered_events: Vec<Arc<PropEvent>> = changes
            .keys()
            .filter_map(|node| events.get(node).cloned())
            .collect();
        let batch = Arc::new(ChangeBatch::new(initial, changes, ordered_events));

        let arena = self.inner.arena.read();
        let mut pairs: Vec<DispatchPair> = Vec::new();
        for node in batch.changes().keys() {
            if let Some(record) = arena.get(*node) {
                for observer in record.observers().snapshot() {
                    // One call per observer per batch, whatever the number
                    // of its nodes that changed.
                    if !pairs.iter().any(|pair| Arc::ptr_eq(&pair.observer, &observer)) {
                        pairs.push(DispatchPair {
                            observer,
                            batch: Arc::clone(&batch),
                        });
                    }
                }
            }
        }
        pairs
    }

    fn flush(&self) {
        // A single flusher at a time drains the queue; a thread that
        // finds a flush in progress leaves its batch behind, and the
        // active flusher's drain loop delivers it in order. The lock
        // also keeps an observer that starts its own transaction from
        // re-entering the drain on the same thread.
        loop {
            {
                let guard = match self.inner.flushing.try_lock() {
                    Some(guard) => guard,
                    None => return,
                };
                let dispatcher = Arc::clone(&*self.inner.dispatcher.read());
                while let Some(pairs) = self.inner.queue.pop() {
                    dispatcher.dispatch(pairs);
                }
                drop(guard);
            }
            // A batch pushed between the last pop and the unlock would
            // otherwise sit until the next conclude.
            if self.inner.queue.is_empty() {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Graph management
    // ------------------------------------------------------------------

    /// Add a node to the graph.
    pub fn insert_node(&self, node: Node) -> NodeId {
        self.acquire_write(false);
        let id = self.inner.arena.write().insert(node);
        self.release_internal(id);
        id
    }

    /// Remove a node, severing its edges in both directions. `None` if the
    /// handle was already stale.
    pub fn remove_node(&self, node: NodeId) -> Option<Node> {
        self.acquire_write(false);
        let removed = self.inner.arena.write().remove(node);
        self.release_internal(node);
        removed
    }

    /// Register `listener` to be informed when `source` changes. A
    /// duplicate registration is a no-op.
    pub fn add_changeable_listener(
        &self,
        source: NodeId,
        listener: NodeId,
    ) -> Result<(), GraphError> {
        self.acquire_write(false);
        let result = {
            let mut arena = self.inner.arena.write();
            if !arena.is_live(source) {
                Err(GraphError::StaleNode(source))
            } else if !arena.is_live(listener) {
                Err(GraphError::StaleNode(listener))
            } else {
                arena.add_edge(source, listener);
                Ok(())
            }
        };
        self.release_internal(source);
        result
    }

    /// Remove a changeable-listener registration. Removing one that was
    /// never added is tolerated with a warning.
    pub fn remove_changeable_listener(&self, source: NodeId, listener: NodeId) {
        self.acquire_write(false);
        let found = self.inner.arena.write().remove_edge(source, listener);
        self.release_internal(source);
        if !found {
            tracing::warn!(
                ?source,
                ?listener,
                "removing a changeable listener that was not registered"
            );
        }
    }

    /// Register an external observer on `node`. Adding the identical
    /// observer twice is a no-op.
    pub fn add_observer(
        &self,
        node: NodeId,
        observer: Arc<dyn ChangeObserver>,
    ) -> Result<(), GraphError> {
        self.acquire_write(false);
        let result = {
            let mut arena = self.inner.arena.write();
            match arena.get_mut(node) {
                Some(record) => {
                    record.observers_mut().add(observer);
                    Ok(())
                }
                None => Err(GraphError::StaleNode(node)),
            }
        };
        self.release_internal(node);
        result
    }

    /// Remove an external observer. Removing one that was never added is
    /// tolerated with a warning.
    pub fn remove_observer(&self, node: NodeId, observer: &Arc<dyn ChangeObserver>) {
        self.acquire_write(false);
        let found = {
            let mut arena = self.inner.arena.write();
            arena
                .get_mut(node)
                .map(|record| record.observers_mut().remove(observer))
                .unwrap_or(false)
        };
        self.release_internal(node);
        if !found {
            tracing::warn!(?node, "removing an observer that was not registered");
        }
    }

    /// Subscribe to transaction boundary events (the undo-layer contract).
    pub fn add_system_listener(&self, listener: Arc<dyn SystemListener>) {
        self.inner.txn_listeners.lock().add(listener);
    }

    /// Unsubscribe from transaction boundary events.
    pub fn remove_system_listener(&self, listener: &Arc<dyn SystemListener>) {
        if !self.inner.txn_listeners.lock().remove(listener) {
            tracing::warn!("removing a system listener that was not registered");
        }
    }

    /// Set a metadata annotation on a node.
    pub fn set_metadata(
        &self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, GraphError> {
        self.acquire_write(false);
        let result = {
            let mut arena = self.inner.arena.write();
            match arena.get_mut(node) {
                Some(record) => Ok(record.set_metadata(key, value)),
                None => Err(GraphError::StaleNode(node)),
            }
        };
        self.release_internal(node);
        result
    }

    /// Read a metadata annotation.
    pub fn metadata(&self, node: NodeId, key: &str) -> Option<String> {
        self.inner
            .arena
            .read()
            .get(node)
            .and_then(|record| record.metadata(key).map(str::to_string))
    }

    /// Remove a metadata annotation, returning its value.
    pub fn remove_metadata(&self, node: NodeId, key: &str) -> Result<Option<String>, GraphError> {
        self.acquire_write(false);
        let result = {
            let mut arena = self.inner.arena.write();
            match arena.get_mut(node) {
                Some(record) => Ok(record.remove_metadata(key)),
                None => Err(GraphError::StaleNode(node)),
            }
        };
        self.release_internal(node);
        result
    }

    /// Does this handle still resolve to a live node?
    pub fn is_live(&self, node: NodeId) -> bool {
        self.inner.arena.read().is_live(node)
    }

    /// The declared change kind of a node.
    pub fn kind_of(&self, node: NodeId) -> Option<ChangeKind> {
        self.inner.arena.read().get(node).map(|record| record.kind())
    }

    /// The number of live nodes in this system.
    pub fn node_count(&self) -> usize {
        self.inner.arena.read().node_count()
    }

    /// Run `f` with shared access to the node arena. Used by consumers
    /// that resolve handles themselves (path steps); do not call write
    /// primitives from inside `f`.
    pub fn with_nodes<R>(&self, f: impl FnOnce(&NodeArena) -> R) -> R {
        let arena = self.inner.arena.read();
        f(&arena)
    }
}

/// RAII write transaction; concludes on drop. Not sendable: the conclude
/// must happen on the preparing thread.
pub struct WriteTxn {
    system: ChangeSystem,
    node: NodeId,
    _not_send: PhantomData<*const ()>,
}

impl WriteTxn {
    /// The node this transaction was opened on.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Propagate a change within this transaction.
    pub fn propagate(&self, change: Change) -> Result<(), GraphError> {
        self.system.propagate_change(self.node, change)
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if let Err(err) = self.system.conclude_change(self.node) {
            tracing::error!(?err, "write transaction failed to conclude");
        }
    }
}

/// RAII read transaction; concludes on drop.
pub struct ReadTxn {
    system: ChangeSystem,
    node: NodeId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReadTxn {
    fn drop(&mut self) {
        if let Err(err) = self.system.conclude_read(self.node) {
            tracing::error!(?err, "read transaction failed to conclude");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ValueResponder;

    #[test]
    fn reentrant_prepare_conclude() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());

        system.prepare_change(node);
        system.prepare_change(node);
        assert!(system.conclude_change(node).is_ok());
        assert!(system.conclude_change(node).is_ok());

        // Fully released: a further conclude is unbalanced.
        assert_eq!(
            system.conclude_change(node),
            Err(GraphError::UnbalancedConclude)
        );
    }

    #[test]
    fn conclude_without_prepare_fails() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());
        assert_eq!(
            system.conclude_change(node),
            Err(GraphError::UnbalancedConclude)
        );
        assert_eq!(system.conclude_read(node), Err(GraphError::UnbalancedRead));
    }

    #[test]
    fn propagate_requires_write_ownership() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());
        let change = Change::triggering(ChangeKind::Value, false);
        assert_eq!(
            system.propagate_change(node, change),
            Err(GraphError::NotWriteOwner)
        );
    }

    #[test]
    fn propagate_rejects_mismatched_kind() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());

        system.prepare_change(node);
        let wrong = Change::triggering(ChangeKind::List, false);
        assert!(matches!(
            system.propagate_change(node, wrong),
            Err(GraphError::ChangeKindMismatch { .. })
        ));
        system.conclude_change(node).unwrap();
    }

    #[test]
    fn propagate_walks_listeners() {
        let system = ChangeSystem::new();
        let source = system.insert_node(Node::value());
        let listener = system.insert_node(Node::with_responder(Arc::new(ValueResponder)));
        system.add_changeable_listener(source, listener).unwrap();

        system.prepare_change(source);
        system
            .propagate_change(source, Change::triggering(ChangeKind::Value, false))
            .unwrap();
        system.conclude_change(source).unwrap();
    }

    #[test]
    fn stale_root_is_rejected() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());
        system.remove_node(node);

        system.prepare_listener_change(node);
        // prepare_listener_change holds the write lock too.
        let result = system.propagate_change(node, Change::triggering(ChangeKind::Value, false));
        assert_eq!(result, Err(GraphError::StaleNode(node)));
        system.conclude_listener_change(node).unwrap();
    }

    #[test]
    fn write_guard_concludes_on_drop() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());
        {
            let txn = system.write(node);
            txn.propagate(Change::triggering(ChangeKind::Value, true))
                .unwrap();
        }
        // Lock released: a fresh prepare succeeds immediately.
        system.prepare_change(node);
        system.conclude_change(node).unwrap();
    }

    #[test]
    fn owner_thread_reads_during_write() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());

        system.prepare_change(node);
        system.prepare_read(node);
        assert!(system.conclude_read(node).is_ok());
        system.conclude_change(node).unwrap();
    }

    #[test]
    fn foreign_thread_conclude_is_rejected() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());

        system.prepare_change(node);
        let other = {
            let system = system.clone();
            thread::spawn(move || system.conclude_change(node))
        };
        assert_eq!(other.join().unwrap(), Err(GraphError::NotWriteOwner));
        system.conclude_change(node).unwrap();
    }

    #[test]
    fn metadata_via_system() {
        let system = ChangeSystem::new();
        let node = system.insert_node(Node::value());

        assert_eq!(system.set_metadata(node, "no-undo", "true").unwrap(), None);
        assert_eq!(system.metadata(node, "no-undo"), Some("true".to_string()));
        assert_eq!(
            system.remove_metadata(node, "no-undo").unwrap(),
            Some("true".to_string())
        );

        system.remove_node(node);
        assert_eq!(
            system.set_metadata(node, "k", "v"),
            Err(GraphError::StaleNode(node))
        );
    }
}
