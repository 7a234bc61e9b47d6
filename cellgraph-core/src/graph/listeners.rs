//! Identity-Keyed Listener Set
//!
//! Observer registrations are tracked by *identity*, never by value
//! equality: two distinct listener objects that happen to compare equal are
//! still two registrations. [`Listeners`] keeps registration order and
//! compares entries with `Arc::ptr_eq`.
//!
//! Iteration never observes concurrent mutation: callers take a
//! [`Listeners::snapshot`] (a clone of the `Arc`s) and iterate that, so a
//! listener added or removed while a dispatch is walking the snapshot
//! neither corrupts the set nor changes the batch being delivered.

use std::sync::Arc;

/// Ordered collection of listeners, unique by identity.
#[derive(Debug)]
pub struct Listeners<T: ?Sized> {
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized> Listeners<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a listener. Adding the identical `Arc` twice is a no-op;
    /// returns `false` in that case.
    pub fn add(&mut self, listener: Arc<T>) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.entries.push(listener);
        true
    }

    /// Remove a listener by identity. Returns `false` when it was not
    /// registered; the caller decides whether that is worth a warning.
    pub fn remove(&mut self, listener: &Arc<T>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !Arc::ptr_eq(entry, listener));
        self.entries.len() != before
    }

    /// Is this exact listener (by identity) registered?
    pub fn contains(&self, listener: &Arc<T>) -> bool {
        self.entries.iter().any(|entry| Arc::ptr_eq(entry, listener))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A stable copy of the registrations, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.clone()
    }
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}
