//! Node Arena
//!
//! All nodes of one system live in a generational slab. A [`NodeId`] is a
//! slot index plus the generation the slot had when the node was inserted;
//! when a node is removed the slot's generation is bumped, so every handle
//! taken before the removal stops resolving in O(1).
//!
//! This gives the core two things at once:
//!
//! - Identity-keyed listener edges: adjacency lists hold handles, and two
//!   handles are the same listener exactly when they are the same slot and
//!   generation. Reference cycles between nodes are plain data here, no
//!   collector needed.
//!
//! - Weak back-references: a consumer that caches a `NodeId` (such as the
//!   path tracker) holds no ownership at all. [`NodeArena::is_live`] is the
//!   staleness check.

use smallvec::SmallVec;

use super::node::Node;

/// Stable handle to a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// The slot index. Only meaningful together with the generation.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of the slot when this handle was created.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// One slab slot. `node` is `None` while the slot is on the free list.
#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational slab of [`Node`] records.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Insert a node and return its handle.
    pub fn insert(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Remove a node, severing its listener edges in both directions.
    ///
    /// Returns the removed record, or `None` if the handle was already
    /// stale.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if !self.is_live(id) {
            return None;
        }
        let node = {
            let slot = &mut self.slots[id.index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node.take()?
        };

        // Drop the back-edges held by this node's sources and listeners.
        let listeners: SmallVec<[NodeId; 4]> = node.changeable_listeners().iter().copied().collect();
        let sources: SmallVec<[NodeId; 4]> = node.sources().iter().copied().collect();
        for listener in listeners {
            if let Some(other) = self.get_mut(listener) {
                other.remove_source(id);
            }
        }
        for source in sources {
            if let Some(other) = self.get_mut(source) {
                other.remove_listener(id);
            }
        }
        self.free.push(id.index);
        Some(node)
    }

    /// Does this handle still resolve to a live node?
    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|slot| slot.generation == id.generation && slot.node.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Add a changeable-listener edge: `listener` will be informed when
    /// `source` changes. A duplicate edge is a no-op.
    ///
    /// Returns `false` when either handle is stale.
    pub fn add_edge(&mut self, source: NodeId, listener: NodeId) -> bool {
        if !self.is_live(source) || !self.is_live(listener) {
            return false;
        }
        if let Some(node) = self.get_mut(source) {
            node.add_listener(listener);
        }
        if let Some(node) = self.get_mut(listener) {
            node.add_source(source);
        }
        true
    }

    /// Remove a changeable-listener edge.
    ///
    /// Returns `false` when the edge (or either node) was not present.
    pub fn remove_edge(&mut self, source: NodeId, listener: NodeId) -> bool {
        let mut found = false;
        if let Some(node) = self.get_mut(source) {
            found = node.remove_listener(listener);
        }
        if let Some(node) = self.get_mut(listener) {
            node.remove_source(source);
        }
        found
    }

    /// The number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_resolve_until_removal() {
        let mut arena = NodeArena::new();
        let id = arena.insert(Node::value());

        assert!(arena.is_live(id));
        assert!(arena.get(id).is_some());

        arena.remove(id);
        assert!(!arena.is_live(id));
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let mut arena = NodeArena::new();
        let first = arena.insert(Node::value());
        arena.remove(first);

        let second = arena.insert(Node::value());
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());

        // The stale handle must not resolve to the new occupant.
        assert!(!arena.is_live(first));
        assert!(arena.get(first).is_none());
        assert!(arena.is_live(second));
    }

    #[test]
    fn edges_are_bidirectional_bookkeeping() {
        let mut arena = NodeArena::new();
        let source = arena.insert(Node::value());
        let listener = arena.insert(Node::value());

        assert!(arena.add_edge(source, listener));
        assert!(arena.get(source).unwrap().changeable_listeners().contains(&listener));
        assert!(arena.get(listener).unwrap().sources().contains(&source));

        // Duplicates are no-ops.
        assert!(arena.add_edge(source, listener));
        assert_eq!(arena.get(source).unwrap().changeable_listeners().len(), 1);

        assert!(arena.remove_edge(source, listener));
        assert!(arena.get(source).unwrap().changeable_listeners().is_empty());
        assert!(arena.get(listener).unwrap().sources().is_empty());
    }

    #[test]
    fn removing_a_node_severs_both_directions() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::value());
        let b = arena.insert(Node::value());
        let c = arena.insert(Node::value());

        arena.add_edge(a, b);
        arena.add_edge(b, c);

        arena.remove(b);
        assert!(arena.get(a).unwrap().changeable_listeners().is_empty());
        assert!(arena.get(c).unwrap().sources().is_empty());
        assert_eq!(arena.node_count(), 2);
    }

    #[test]
    fn remove_edge_reports_missing() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::value());
        let b = arena.insert(Node::value());

        assert!(!arena.remove_edge(a, b));
    }

    #[test]
    fn cyclic_edges_are_plain_data() {
        let mut arena = NodeArena::new();
        let a = arena.insert(Node::value());
        let b = arena.insert(Node::value());

        arena.add_edge(a, b);
        arena.add_edge(b, a);

        assert!(arena.get(a).unwrap().changeable_listeners().contains(&b));
        assert!(arena.get(b).unwrap().changeable_listeners().contains(&a));

        arena.remove(a);
        assert!(arena.get(b).unwrap().changeable_listeners().is_empty());
        assert!(arena.get(b).unwrap().sources().is_empty());
    }
}
