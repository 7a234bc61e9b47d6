//! Collection Deltas
//!
//! A delta describes the *scope* of one structural edit to a collection:
//! what kind of edit it was, how the size changed, and (for lists) which
//! index range is affected. Collection implementations construct the delta
//! *after* mutating their storage, from size and index bookkeeping alone;
//! the derivation rules here are the contract, the storage is not.
//!
//! # Contract
//!
//! A delta must never understate the true edit. It may overstate: report an
//! alteration across a wider range than actually changed, or fall back to
//! [`DeltaKind::Complete`] when the precise shape is unrepresentable.
//! Non-contiguous multi-step edits are represented as a *sequence* of
//! deltas; the core never coalesces deltas lossily.
//!
//! Unknown sizes and indices are `None` (the source framework used `-1`
//! sentinels for these).

/// The kind of collection edit a delta describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    /// Anything may have changed, including the size.
    Complete,
    /// Elements changed in place; the size did not.
    Alteration,
    /// Elements were added.
    Insertion,
    /// Elements were removed.
    Deletion,
    /// The collection was emptied.
    Clear,
}

/// Immutable description of one edit to an ordered collection.
///
/// Index bounds are inclusive and refer to the widest coordinate space of
/// the edit: for an insertion everything from the insertion point to the
/// new end has shifted, for a deletion everything from the deletion point
/// to the *old* end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListDelta {
    kind: DeltaKind,
    old_size: Option<usize>,
    new_size: Option<usize>,
    first: Option<usize>,
    last: Option<usize>,
}

impl ListDelta {
    /// One element appended at the end.
    pub fn pushed(new_size: usize) -> Self {
        debug_assert!(new_size >= 1);
        Self {
            kind: DeltaKind::Insertion,
            old_size: Some(new_size - 1),
            new_size: Some(new_size),
            first: Some(new_size - 1),
            last: Some(new_size - 1),
        }
    }

    /// One element inserted at `index`; everything after it shifted.
    pub fn inserted(index: usize, new_size: usize) -> Self {
        debug_assert!(index < new_size);
        Self {
            kind: DeltaKind::Insertion,
            old_size: Some(new_size - 1),
            new_size: Some(new_size),
            first: Some(index),
            last: Some(new_size - 1),
        }
    }

    /// `count` elements inserted at `index`.
    pub fn inserted_all(index: usize, count: usize, new_size: usize) -> Self {
        debug_assert!(count <= new_size && index + count <= new_size);
        Self {
            kind: DeltaKind::Insertion,
            old_size: Some(new_size - count),
            new_size: Some(new_size),
            first: if new_size > 0 { Some(index) } else { None },
            last: new_size.checked_sub(1),
        }
    }

    /// One element removed at `index`; the range spans to the old last
    /// index, since everything after the removal point shifted.
    pub fn removed(index: usize, new_size: usize) -> Self {
        debug_assert!(index <= new_size);
        Self {
            kind: DeltaKind::Deletion,
            old_size: Some(new_size + 1),
            // The old last index equals the new size.
            new_size: Some(new_size),
            first: Some(index),
            last: Some(new_size),
        }
    }

    /// One element replaced in place at `index`.
    pub fn altered(index: usize, size: usize) -> Self {
        debug_assert!(index < size);
        Self {
            kind: DeltaKind::Alteration,
            old_size: Some(size),
            new_size: Some(size),
            first: Some(index),
            last: Some(index),
        }
    }

    /// Every element may have changed in place; the size did not.
    pub fn altered_all(size: usize) -> Self {
        Self {
            kind: DeltaKind::Alteration,
            old_size: Some(size),
            new_size: Some(size),
            first: if size > 0 { Some(0) } else { None },
            last: size.checked_sub(1),
        }
    }

    /// The collection was emptied.
    pub fn cleared(old_size: usize) -> Self {
        Self {
            kind: DeltaKind::Clear,
            old_size: Some(old_size),
            new_size: Some(0),
            first: if old_size > 0 { Some(0) } else { None },
            last: old_size.checked_sub(1),
        }
    }

    /// Nothing is known beyond (possibly) the sizes. The legal fallback for
    /// any edit whose shape cannot be represented.
    pub fn complete(old_size: Option<usize>, new_size: Option<usize>) -> Self {
        Self {
            kind: DeltaKind::Complete,
            old_size,
            new_size,
            first: None,
            last: None,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        self.kind
    }

    pub fn old_size(&self) -> Option<usize> {
        self.old_size
    }

    pub fn new_size(&self) -> Option<usize> {
        self.new_size
    }

    /// First affected index, inclusive. `None` when unknown or empty.
    pub fn first_changed(&self) -> Option<usize> {
        self.first
    }

    /// Last affected index, inclusive. `None` when unknown or empty.
    pub fn last_changed(&self) -> Option<usize> {
        self.last
    }

    /// Size difference `new - old`, when both sizes are known.
    pub fn change_size(&self) -> Option<isize> {
        match (self.old_size, self.new_size) {
            (Some(old), Some(new)) => Some(new as isize - old as isize),
            _ => None,
        }
    }
}

/// Immutable description of one edit to a keyed collection.
///
/// Maps carry no index range; instead they record whether the edit touched
/// exactly one known key (so consumers can avoid a full re-read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDelta {
    kind: DeltaKind,
    old_size: Option<usize>,
    new_size: Option<usize>,
    single_key_known: bool,
}

impl MapDelta {
    /// One entry added under a new key.
    pub fn inserted(new_size: usize) -> Self {
        debug_assert!(new_size >= 1);
        Self {
            kind: DeltaKind::Insertion,
            old_size: Some(new_size - 1),
            new_size: Some(new_size),
            single_key_known: true,
        }
    }

    /// One entry removed.
    pub fn removed(new_size: usize) -> Self {
        Self {
            kind: DeltaKind::Deletion,
            old_size: Some(new_size + 1),
            new_size: Some(new_size),
            single_key_known: true,
        }
    }

    /// The value under one known key was replaced.
    pub fn altered_key(size: usize) -> Self {
        Self {
            kind: DeltaKind::Alteration,
            old_size: Some(size),
            new_size: Some(size),
            single_key_known: true,
        }
    }

    /// Any value may have been replaced; the key set did not change.
    pub fn altered_all(size: usize) -> Self {
        Self {
            kind: DeltaKind::Alteration,
            old_size: Some(size),
            new_size: Some(size),
            single_key_known: false,
        }
    }

    /// The map was emptied.
    pub fn cleared(old_size: usize) -> Self {
        Self {
            kind: DeltaKind::Clear,
            old_size: Some(old_size),
            new_size: Some(0),
            single_key_known: false,
        }
    }

    /// Fallback when nothing beyond (possibly) the sizes is known.
    pub fn complete(old_size: Option<usize>, new_size: Option<usize>) -> Self {
        Self {
            kind: DeltaKind::Complete,
            old_size,
            new_size,
            single_key_known: false,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        self.kind
    }

    pub fn old_size(&self) -> Option<usize> {
        self.old_size
    }

    pub fn new_size(&self) -> Option<usize> {
        self.new_size
    }

    /// Did the edit touch exactly one key, and is that key known to the
    /// producer of this delta?
    pub fn single_key_known(&self) -> bool {
        self.single_key_known
    }

    pub fn change_size(&self) -> Option<isize> {
        match (self.old_size, self.new_size) {
            (Some(old), Some(new)) => Some(new as isize - old as isize),
            _ => None,
        }
    }
}

/// Immutable description of one edit to an unordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDelta {
    kind: DeltaKind,
    old_size: Option<usize>,
    new_size: Option<usize>,
}

impl SetDelta {
    /// One element added.
    pub fn inserted(new_size: usize) -> Self {
        debug_assert!(new_size >= 1);
        Self {
            kind: DeltaKind::Insertion,
            old_size: Some(new_size - 1),
            new_size: Some(new_size),
        }
    }

    /// One element removed.
    pub fn removed(new_size: usize) -> Self {
        Self {
            kind: DeltaKind::Deletion,
            old_size: Some(new_size + 1),
            new_size: Some(new_size),
        }
    }

    /// The set was emptied.
    pub fn cleared(old_size: usize) -> Self {
        Self {
            kind: DeltaKind::Clear,
            old_size: Some(old_size),
            new_size: Some(0),
        }
    }

    /// Fallback when nothing beyond (possibly) the sizes is known.
    pub fn complete(old_size: Option<usize>, new_size: Option<usize>) -> Self {
        Self {
            kind: DeltaKind::Complete,
            old_size,
            new_size,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        self.kind
    }

    pub fn old_size(&self) -> Option<usize> {
        self.old_size
    }

    pub fn new_size(&self) -> Option<usize> {
        self.new_size
    }

    pub fn change_size(&self) -> Option<isize> {
        match (self.old_size, self.new_size) {
            (Some(old), Some(new)) => Some(new as isize - old as isize),
            _ => None,
        }
    }
}
