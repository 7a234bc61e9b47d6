//! The per-node change record.
//!
//! A [`Change`] is the minimal description of one node's change within one
//! propagation: whether it was the *initial* (triggering) change, and
//! whether reference identities reachable through the node are guaranteed
//! unchanged (`same_instances`). For a given kind there are exactly four
//! possible values, so a `Change` is a cheap `Copy` value and "is this the
//! same record" is plain equality.
//!
//! # Merging
//!
//! When a node is reachable through several paths in one propagation, its
//! accumulated change is the join of all contributing changes:
//!
//! - `initial` is OR-ed (any contributor was the trigger),
//! - `same_instances` is AND-ed (the guarantee survives only if every
//!   contributor gives it).
//!
//! The four values per kind form a join-semilattice of height 3. This is
//! what bounds propagation over cyclic graphs: a node's record can only be
//! extended a bounded number of times before every further merge yields
//! "no new information" and traversal stops along that edge.

use crate::error::GraphError;

/// The declared kind of change a node emits.
///
/// A node's kind is fixed when the node is created. Merging changes of
/// different kinds is a programmer error and fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A plain value cell.
    Value,
    /// An ordered collection; deltas are [`crate::change::ListDelta`].
    List,
    /// A keyed collection; deltas are [`crate::change::MapDelta`].
    Map,
    /// An unordered collection; deltas are [`crate::change::SetDelta`].
    Set,
}

/// Immutable description of one node's change in one propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Change {
    kind: ChangeKind,
    initial: bool,
    same_instances: bool,
}

impl Change {
    /// The change record with the given flags.
    ///
    /// `same_instances = true` must only be reported when it is truly
    /// guaranteed that no reference identity changed; reporting `false`
    /// when identities did survive is always safe (a permitted
    /// overstatement), the reverse is not.
    pub const fn instance(kind: ChangeKind, initial: bool, same_instances: bool) -> Self {
        Self {
            kind,
            initial,
            same_instances,
        }
    }

    /// The change a mutator reports for a direct write: the triggering
    /// change of a propagation.
    pub const fn triggering(kind: ChangeKind, same_instances: bool) -> Self {
        Self::instance(kind, true, same_instances)
    }

    /// The change a node reports when something upstream changed: not the
    /// trigger, and the node's own identities are intact.
    pub const fn consequential(kind: ChangeKind) -> Self {
        Self::instance(kind, false, true)
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Was this the first (triggering) change of the propagation?
    pub fn initial(&self) -> bool {
        self.initial
    }

    /// Are all reference identities guaranteed unchanged?
    pub fn same_instances(&self) -> bool {
        self.same_instances
    }

    /// Merge this change into an existing record for the same node.
    ///
    /// Returns `Ok(None)` when `existing` already covers this change (no
    /// new information; the caller must not re-walk the node's listeners),
    /// or `Ok(Some(merged))` with a record at least as general as both.
    ///
    /// Extending across kinds fails fast with
    /// [`GraphError::ChangeKindMismatch`].
    pub fn extend(self, existing: Change) -> Result<Option<Change>, GraphError> {
        if self.kind != existing.kind {
            return Err(GraphError::ChangeKindMismatch {
                existing: existing.kind,
                incoming: self.kind,
            });
        }
        let merged = Change::instance(
            self.kind,
            self.initial || existing.initial,
            self.same_instances && existing.same_instances,
        );
        if merged == existing {
            Ok(None)
        } else {
            Ok(Some(merged))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_instances_per_kind() {
        let all = [
            Change::instance(ChangeKind::Value, false, false),
            Change::instance(ChangeKind::Value, false, true),
            Change::instance(ChangeKind::Value, true, false),
            Change::instance(ChangeKind::Value, true, true),
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                assert_eq!(a == b, i == j);
            }
        }
    }

    #[test]
    fn extend_is_a_join() {
        let initial = Change::instance(ChangeKind::Value, true, true);
        let deep = Change::instance(ChangeKind::Value, false, false);

        let merged = deep.extend(initial).unwrap().unwrap();
        assert!(merged.initial());
        assert!(!merged.same_instances());
    }

    #[test]
    fn extend_covered_yields_nothing() {
        let general = Change::instance(ChangeKind::Value, true, false);
        let weaker = Change::instance(ChangeKind::Value, false, true);

        // The general record already covers the weaker one.
        assert_eq!(weaker.extend(general).unwrap(), None);

        // Extending a record with itself is also a no-op.
        assert_eq!(general.extend(general).unwrap(), None);
    }

    #[test]
    fn extend_never_regresses() {
        // Every pairwise merge is at least as general as both inputs.
        let flags = [(false, false), (false, true), (true, false), (true, true)];
        for &(i1, s1) in &flags {
            for &(i2, s2) in &flags {
                let a = Change::instance(ChangeKind::List, i1, s1);
                let b = Change::instance(ChangeKind::List, i2, s2);
                let merged = a.extend(b).unwrap().unwrap_or(b);
                assert_eq!(merged.initial(), i1 || i2);
                assert_eq!(merged.same_instances(), s1 && s2);
            }
        }
    }

    #[test]
    fn extend_across_kinds_fails_fast() {
        let list = Change::consequential(ChangeKind::List);
        let value = Change::consequential(ChangeKind::Value);
        assert_eq!(
            list.extend(value),
            Err(GraphError::ChangeKindMismatch {
                existing: ChangeKind::Value,
                incoming: ChangeKind::List,
            })
        );
    }
}
