//! Per-run set of entities already sent through the artwork cascade.

use std::collections::HashSet;

use lyrebird_common::EntityKey;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<EntityKey>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check and insert. Returns `true` for the first caller only.
    pub fn claim(&self, key: &EntityKey) -> bool {
        self.seen.lock().insert(key.clone())
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.seen.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}
