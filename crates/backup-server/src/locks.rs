//! Mutual exclusion over backup names.
//!

use std::{
    collections::HashSet,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

/// An in-process lock per backup name.
///
/// Operations that check then change a backup hold the lock for its name so two operations can
/// never both pass the same existence check.
#[derive(Debug, Default)]
pub struct NameLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl NameLocks {
    /// Create a set of locks with no names held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until none of `names` are held, then hold all of them until the guard is dropped.
    pub fn lock(&self, names: &[&str]) -> NameGuard<'_> {
        let mut held = self.held_names();

        while names.iter().any(|name| held.contains(*name)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        held.extend(names.iter().cloned());

        NameGuard { locks: self, names }
    }

    /// If a name is currently held.
    pub fn is_held(&self, name: &str) -> bool {
        self.held_names().contains(name)
    }

    fn held_names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds backup names until dropped.
#[derive(Debug)]
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    names: Vec<String>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held_names();
        for name in &self.names {
            held.remove(name);
        }
        drop(held);

        self.locks.released.notify_all();
    }
}
