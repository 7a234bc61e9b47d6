//! Path Tracking
//!
//! A [`TrackedPath`] follows a chain of nodes from a root through a list
//! of named resolution steps ("the bean referenced by this property, then
//! the property named X on it, ...") and caches the resolved chain. It is
//! the canonical consumer of the propagation core: it must stay correct
//! under identity changes anywhere along the path, while reusing its cache
//! when only leaf values mutate.
//!
//! # Cache lifecycle
//!
//! `Invalid -> Valid -> Invalid`, driven by change notifications:
//!
//! - While invalid (or errored), any upstream change is answered with a
//!   conservative "assume changed" without recomputing; the rebuild
//!   happens lazily on the next [`TrackedPath::terminal`] call.
//! - While valid, a non-`same_instances` change on a non-terminal cached
//!   node means the path may have changed shape: invalidate and report.
//!   A change on the terminal node alone is forwarded without touching
//!   the cache.
//!
//! The cached chain holds plain [`NodeId`] handles, which are weak by
//! construction: a handle whose slot was freed stops resolving, and a
//! dead handle is treated exactly like an invalid cache. Rebuilding
//! unsubscribes from the stale chain first, then re-subscribes to every
//! node visited; a step that fails to resolve leaves the path `Errored`
//! (a legitimate transient state, reported as "no value", not an error).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::change::{Change, ChangeKind};
use crate::engine::{ChangeSystem, PropagationView};
use crate::graph::{ChangeResponder, Node, NodeArena, NodeId};

/// One resolution step: given the arena and the node the previous step
/// produced, name the next node on the path.
pub struct PathStep {
    name: String,
    resolve: Arc<dyn Fn(&NodeArena, NodeId) -> Option<NodeId> + Send + Sync>,
}

impl PathStep {
    pub fn new(
        name: impl Into<String>,
        resolve: impl Fn(&NodeArena, NodeId) -> Option<NodeId> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for PathStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathStep").field("name", &self.name).finish()
    }
}

/// Validity of the cached chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// The chain must be rebuilt before the terminal can be read.
    Invalid,
    /// The chain is current.
    Valid,
    /// The last rebuild hit a step that did not resolve; there is no value
    /// until something upstream changes.
    Errored,
}

struct PathCache {
    state: CacheState,
    /// Root first, terminal last. Handles only; never ownership.
    nodes: Vec<NodeId>,
}

struct PathResponder {
    cache: Arc<Mutex<PathCache>>,
}

impl ChangeResponder for PathResponder {
    fn internal_change(
        &self,
        _source: NodeId,
        _source_change: Change,
        view: &PropagationView<'_>,
    ) -> Option<Change> {
        let mut cache = self.cache.lock();
        match cache.state {
            // No usable cache: answer conservatively, recompute lazily.
            CacheState::Invalid | CacheState::Errored => {
                Some(Change::instance(ChangeKind::Value, false, false))
            }
            CacheState::Valid => {
                let terminal = *cache.nodes.last()?;
                for &node in &cache.nodes {
                    if node == terminal {
                        continue;
                    }
                    if let Some(change) = view.change_of(node) {
                        if !change.same_instances() {
                            // An intermediate identity changed: the path
                            // may have a different shape now.
                            cache.state = CacheState::Invalid;
                            return Some(Change::instance(ChangeKind::Value, false, false));
                        }
                    }
                }
                view.change_of(terminal)
                    .map(|change| Change::instance(ChangeKind::Value, false, change.same_instances()))
            }
        }
    }
}

/// A cached dependency chain followed from a root through [`PathStep`]s.
pub struct TrackedPath {
    system: ChangeSystem,
    root: NodeId,
    steps: Vec<PathStep>,
    node: NodeId,
    cache: Arc<Mutex<PathCache>>,
}

impl TrackedPath {
    /// Create the tracker. It owns a node in the graph, so it participates
    /// in propagation like any other changeable; the chain is resolved
    /// lazily on first [`TrackedPath::terminal`].
    pub fn new(system: &ChangeSystem, root: NodeId, steps: Vec<PathStep>) -> Self {
        let cache = Arc::new(Mutex::new(PathCache {
            state: CacheState::Invalid,
            nodes: Vec::new(),
        }));
        let node = system.insert_node(Node::with_responder(Arc::new(PathResponder {
            cache: Arc::clone(&cache),
        })));
        Self {
            system: system.clone(),
            root,
            steps,
            node,
            cache,
        }
    }

    /// This tracker's own graph node (listen to it to observe the path).
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> CacheState {
        self.cache.lock().state
    }

    /// The node the path currently resolves to, rebuilding the cache if
    /// needed. `None` while the path is broken.
    pub fn terminal(&self) -> Option<NodeId> {
        {
            let cache = self.cache.lock();
            if cache.state == CacheState::Valid {
                // Handles may have died since validation; a dead handle
                // means the cache is no longer usable.
                let all_live = cache.nodes.iter().all(|&node| self.system.is_live(node));
                if all_live {
                    return cache.nodes.last().copied();
                }
            }
        }
        self.rebuild()
    }

    fn rebuild(&self) -> Option<NodeId> {
        // Take the listener-change lock before the cache lock: the
        // responder runs under the write lock and takes the cache lock,
        // so the reverse order here would deadlock against a concurrent
        // propagation.
        self.system.prepare_listener_change(self.node);
        let result = self.rebuild_locked();
        if let Err(err) = self.system.conclude_listener_change(self.node) {
            tracing::error!(?err, "path rebuild failed to conclude");
        }
        result
    }

    fn rebuild_locked(&self) -> Option<NodeId> {
        let mut cache = self.cache.lock();

        // Unsubscribe from the stale chain first.
        for &node in &cache.nodes {
            if self.system.is_live(node) {
                self.system.remove_changeable_listener(node, self.node);
            }
        }
        cache.nodes.clear();

        if !self.system.is_live(self.root) {
            cache.state = CacheState::Errored;
            return None;
        }
        cache.nodes.push(self.root);

        let mut current = self.root;
        let mut errored_at: Option<&str> = None;
        for step in &self.steps {
            let next = self
                .system
                .with_nodes(|arena| (step.resolve)(arena, current))
                .filter(|&node| self.system.is_live(node));
            match next {
                Some(node) => {
                    cache.nodes.push(node);
                    current = node;
                }
                None => {
                    errored_at = Some(step.name());
                    break;
                }
            }
        }

        // Subscribe to every node visited, broken path or not, so an
        // upstream change can repair it later.
        for &node in &cache.nodes {
            if let Err(err) = self.system.add_changeable_listener(node, self.node) {
                tracing::warn!(?err, "path tracker could not subscribe to a chain node");
            }
        }

        match errored_at {
            Some(step) => {
                tracing::warn!(step, "path step did not resolve; path is errored");
                cache.state = CacheState::Errored;
                None
            }
            None => {
                cache.state = CacheState::Valid;
                cache.nodes.last().copied()
            }
        }
    }
}

impl Drop for TrackedPath {
    fn drop(&mut self) {
        // Drop our subscriptions and our node; the chain nodes themselves
        // are not ours. Same lock order as rebuild: write before cache.
        self.system.prepare_listener_change(self.node);
        {
            let cache = self.cache.lock();
            for &node in &cache.nodes {
                if self.system.is_live(node) {
                    self.system.remove_changeable_listener(node, self.node);
                }
            }
        }
        self.system.remove_node(self.node);
        if let Err(err) = self.system.conclude_listener_change(self.node) {
            tracing::error!(?err, "path teardown failed to conclude");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_step(name: &str, target: Arc<Mutex<NodeId>>) -> PathStep {
        PathStep::new(name, move |_arena, _current| Some(*target.lock()))
    }

    #[test]
    fn resolves_and_caches() {
        let system = ChangeSystem::new();
        let root = system.insert_node(Node::value());
        let leaf = system.insert_node(Node::value());
        let slot = Arc::new(Mutex::new(leaf));

        let path = TrackedPath::new(&system, root, vec![fixed_step("leaf", slot)]);
        assert_eq!(path.state(), CacheState::Invalid);
        assert_eq!(path.terminal(), Some(leaf));
        assert_eq!(path.state(), CacheState::Valid);
    }

    #[test]
    fn broken_step_leaves_errored_not_panicking() {
        let system = ChangeSystem::new();
        let root = system.insert_node(Node::value());

        let path = TrackedPath::new(
            &system,
            root,
            vec![PathStep::new("missing", |_arena, _current| None)],
        );
        assert_eq!(path.terminal(), None);
        assert_eq!(path.state(), CacheState::Errored);
    }

    #[test]
    fn dead_handle_invalidates_the_cache() {
        let system = ChangeSystem::new();
        let root = system.insert_node(Node::value());
        let first_leaf = system.insert_node(Node::value());
        let slot = Arc::new(Mutex::new(first_leaf));

        let path = TrackedPath::new(&system, root, vec![fixed_step("leaf", Arc::clone(&slot))]);
        assert_eq!(path.terminal(), Some(first_leaf));

        // Kill the cached terminal and repoint the step.
        let second_leaf = system.insert_node(Node::value());
        system.remove_node(first_leaf);
        *slot.lock() = second_leaf;

        assert_eq!(path.terminal(), Some(second_leaf));
        assert_eq!(path.state(), CacheState::Valid);
    }

    #[test]
    fn dead_root_is_errored() {
        let system = ChangeSystem::new();
        let root = system.insert_node(Node::value());
        let leaf = system.insert_node(Node::value());
        let slot = Arc::new(Mutex::new(leaf));
        let path = TrackedPath::new(&system, root, vec![fixed_step("leaf", slot)]);

        system.remove_node(root);
        assert_eq!(path.terminal(), None);
        assert_eq!(path.state(), CacheState::Errored);
    }
}
