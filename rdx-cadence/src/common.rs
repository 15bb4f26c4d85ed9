//! Contains common, primitive types shared across the crate.
//!
//! This module defines the small building blocks the runner is assembled
//! from: the key type used to address registered actions and the
//! insertion-ordered bag that stores them. Using a distinct key type instead
//! of bare integers improves type safety and code clarity.

/// Uniquely identifies an action registered on a single task.
///
/// Keys are handed out in strictly increasing order and are never reused,
/// so a key kept after its action was removed can never address a later
/// action by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

/// An insertion-ordered store of values with stable, never-reused keys.
///
/// Iteration visits entries in the order they were appended, which is the
/// order a task fires its actions in. Removal is linear, which is fine for
/// the handful of actions a task typically carries.
pub struct Bag<T> {
    next: u64,
    entries: Vec<(ActionId, T)>,
}

impl<T> Bag<T> {
    /// Creates an empty bag.
    pub const fn new() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }

    /// Appends a value and returns the key that addresses it.
    pub fn append(&mut self, value: T) -> ActionId {
        let key = ActionId(self.next);
        self.next += 1;
        self.entries.push((key, value));
        key
    }

    /// Borrows the value stored under `key`, if it is still present.
    pub fn get(&self, key: ActionId) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Removes the value stored under `key`, if it is still present.
    pub fn remove(&mut self, key: ActionId) -> Option<T> {
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Removes every entry. Keys of removed entries stay retired.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<T> Default for Bag<T> {
    fn default() -> Self {
        Self::new()
    }
}
