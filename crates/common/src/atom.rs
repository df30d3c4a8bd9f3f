//! A concurrency-safe cell holding an immutable key-value snapshot.

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

type Snapshot = Arc<Map<String, Value>>;

/// Mutable cell over an immutable map.
///
/// Readers always observe a complete snapshot; every update replaces the whole
/// map under the write lock, so partial writes are never visible.
#[derive(Debug, Default)]
pub struct KeyValueAtom {
    value: RwLock<Snapshot>,
}

impl KeyValueAtom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(map: Map<String, Value>) -> Self {
        Self {
            value: RwLock::new(Arc::new(map)),
        }
    }

    /// The current snapshot.
    pub fn value(&self) -> Snapshot {
        Arc::clone(&self.value.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Merge a single key into the map. Returns the new snapshot.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Snapshot {
        let (key, value) = (key.into(), value.into());
        self.swap(move |current| {
            let mut next = current.clone();
            next.insert(key, value);
            next
        })
    }

    /// Remove a key. Returns the value it held, if any.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut removed = None;
        self.swap(|current| {
            let mut next = current.clone();
            removed = next.remove(key);
            next
        });
        removed
    }

    /// Replace the map with the result of `f` applied to the current snapshot.
    ///
    /// `f` runs while the cell is locked for writing, so concurrent swaps are
    /// serialized and none of them is lost.
    pub fn swap<F>(&self, f: F) -> Snapshot
    where
        F: FnOnce(&Map<String, Value>) -> Map<String, Value>,
    {
        let mut guard = self.value.write().unwrap_or_else(|e| e.into_inner());
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        next
    }

    /// Replace the whole map, returning the previous snapshot.
    pub fn reset(&self, map: Map<String, Value>) -> Snapshot {
        let mut guard = self.value.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(map))
    }
}
