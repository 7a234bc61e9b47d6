//! Dispatch Queue and Dispatchers
//!
//! Observer notification is decoupled from propagation: while a
//! transaction is in flight, nothing reaches external observers. When the
//! outermost `conclude_change` runs, the settled snapshot is frozen into
//! one immutable [`ChangeBatch`], paired with every interested observer
//! (one pair per observer, deduplicated by identity), queued, and flushed
//! after the write lock is released.
//!
//! # Ordering
//!
//! All pairs produced by one top-level propagation are delivered as one
//! batch, before any pairs from a later propagation. The queue has its own
//! lock, separate from the write lock; it is only appended to by the
//! concluding writer and drained at quiescence.
//!
//! # Dispatchers
//!
//! Delivery is pluggable:
//!
//! - [`InlineDispatcher`] (the default) delivers synchronously on the
//!   concluding thread.
//! - [`MarshalledDispatcher`] posts batches to one fixed delivery thread
//!   (the usual arrangement when observers are UI views). If the caller
//!   already *is* the delivery thread, delivery happens inline instead of
//!   being re-queued.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::change::{Change, PropEvent};
use crate::graph::{ChangeObserver, NodeId};

/// The frozen, immutable result of one top-level propagation.
#[derive(Debug)]
pub struct ChangeBatch {
    initial: Vec<NodeId>,
    changes: IndexMap<NodeId, Change>,
    events: Vec<Arc<PropEvent>>,
}

impl ChangeBatch {
    pub(crate) fn new(
        initial: Vec<NodeId>,
        changes: IndexMap<NodeId, Change>,
        events: Vec<Arc<PropEvent>>,
    ) -> Self {
        Self {
            initial,
            changes,
            events,
        }
    }

    /// The nodes the mutator wrote directly, in write order.
    pub fn initial(&self) -> &[NodeId] {
        &self.initial
    }

    /// Every affected node's merged change, in first-reached order.
    pub fn changes(&self) -> &IndexMap<NodeId, Change> {
        &self.changes
    }

    /// The merged change of one node, if it changed in this batch.
    pub fn change_of(&self, node: NodeId) -> Option<Change> {
        self.changes.get(&node).copied()
    }

    /// The event chains of this batch, in first-reached order.
    pub fn events(&self) -> &[Arc<PropEvent>] {
        &self.events
    }

    /// The event chain of one node, if it changed in this batch.
    pub fn event_of(&self, node: NodeId) -> Option<&Arc<PropEvent>> {
        self.events.iter().find(|event| event.node() == node)
    }
}

/// One observer paired with the batch it should receive.
pub struct DispatchPair {
    pub observer: Arc<dyn ChangeObserver>,
    pub batch: Arc<ChangeBatch>,
}

/// Delivery strategy for dispatch pairs.
pub trait Dispatcher: Send + Sync {
    /// Deliver every pair of one batch. Pairs of a single call belong to
    /// one propagation and must not be interleaved with other batches.
    fn dispatch(&self, pairs: Vec<DispatchPair>);
}

fn deliver(pairs: &[DispatchPair]) {
    for pair in pairs {
        pair.observer.changed(&pair.batch);
    }
}

/// Synchronous delivery on the calling thread.
#[derive(Debug, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, pairs: Vec<DispatchPair>) {
        deliver(&pairs);
    }
}

/// Delivery marshalled onto one fixed thread.
///
/// Batches posted from other threads are delivered in posting order on the
/// delivery thread; a batch dispatched *from* the delivery thread is
/// delivered inline to preserve ordering relative to work already running
/// there.
pub struct MarshalledDispatcher {
    sender: Mutex<Option<mpsc::Sender<Vec<DispatchPair>>>>,
    delivery_thread: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MarshalledDispatcher {
    /// Spawn the delivery thread and return the dispatcher bound to it.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the delivery thread. A
    /// marshalled dispatcher without its thread cannot deliver anything,
    /// so there is no degraded mode to fall back to.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Vec<DispatchPair>>();
        let handle = thread::Builder::new()
            .name("cellgraph-dispatch".into())
            .spawn(move || {
                while let Ok(pairs) = receiver.recv() {
                    deliver(&pairs);
                }
            })
            .expect("failed to spawn dispatch thread");
        let delivery_thread = handle.thread().id();
        Self {
            sender: Mutex::new(Some(sender)),
            delivery_thread,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// The thread batches are delivered on.
    pub fn delivery_thread(&self) -> ThreadId {
        self.delivery_thread
    }

    /// Stop accepting batches, drain what was already posted, and join the
    /// delivery thread.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for MarshalledDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for MarshalledDispatcher {
    fn dispatch(&self, pairs: Vec<DispatchPair>) {
        if thread::current().id() == self.delivery_thread {
            deliver(&pairs);
            return;
        }
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(pairs).is_err() {
                    tracing::warn!("dispatch batch dropped: delivery thread has exited");
                }
            }
            None => tracing::warn!("dispatch batch dropped: dispatcher is shut down"),
        }
    }
}

impl Drop for MarshalledDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// FIFO of batches awaiting delivery.
#[derive(Default)]
pub(crate) struct DispatchQueue {
    queued: Mutex<VecDeque<Vec<DispatchPair>>>,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, pairs: Vec<DispatchPair>) {
        self.queued.lock().push_back(pairs);
    }

    pub(crate) fn pop(&self) -> Option<Vec<DispatchPair>> {
        self.queued.lock().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queued.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::graph::{Node, NodeArena};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        calls: AtomicUsize,
    }

    impl ChangeObserver for CountingObserver {
        fn changed(&self, _batch: &ChangeBatch) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_batch() -> Arc<ChangeBatch> {
        let mut arena = NodeArena::new();
        let node = arena.insert(Node::value());
        let change = Change::triggering(ChangeKind::Value, false);
        let mut changes = IndexMap::new();
        changes.insert(node, change);
        let event = PropEvent::root_cause(node, change);
        Arc::new(ChangeBatch::new(vec![node], changes, vec![event]))
    }

    #[test]
    fn inline_dispatcher_delivers_every_pair() {
        let observer = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let batch = test_batch();

        let pairs = vec![
            DispatchPair {
                observer: observer.clone(),
                batch: batch.clone(),
            },
            DispatchPair {
                observer: observer.clone(),
                batch,
            },
        ];
        InlineDispatcher.dispatch(pairs);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_lookup_by_node() {
        let batch = test_batch();
        let node = batch.initial()[0];
        assert!(batch.change_of(node).is_some());
        assert_eq!(batch.event_of(node).map(|e| e.node()), Some(node));
        assert_eq!(batch.changes().len(), 1);
    }

    #[test]
    fn queue_preserves_fifo_order() {
        let queue = DispatchQueue::new();
        let batch = test_batch();
        let first = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingObserver {
            calls: AtomicUsize::new(0),
        });

        queue.push(vec![DispatchPair {
            observer: first.clone(),
            batch: batch.clone(),
        }]);
        queue.push(vec![DispatchPair {
            observer: second.clone(),
            batch,
        }]);

        let popped = queue.pop().unwrap();
        assert!(Arc::ptr_eq(
            &popped[0].observer,
            &(first as Arc<dyn ChangeObserver>)
        ));
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn marshalled_dispatcher_delivers_on_its_thread() {
        use std::sync::mpsc::channel;

        struct ThreadProbe {
            tx: Mutex<mpsc::Sender<ThreadId>>,
        }
        impl ChangeObserver for ThreadProbe {
            fn changed(&self, _batch: &ChangeBatch) {
                let _ = self.tx.lock().send(thread::current().id());
            }
        }

        let dispatcher = MarshalledDispatcher::new();
        let (tx, rx) = channel();
        let observer = Arc::new(ThreadProbe { tx: Mutex::new(tx) });

        dispatcher.dispatch(vec![DispatchPair {
            observer,
            batch: test_batch(),
        }]);

        let delivered_on = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("batch was not delivered");
        assert_eq!(delivered_on, dispatcher.delivery_thread());
        assert_ne!(delivered_on, thread::current().id());
        dispatcher.shutdown();
    }
}
