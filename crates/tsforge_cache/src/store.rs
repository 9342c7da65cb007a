//! Keyed storage abstraction used for both cache keyspaces.

use std::collections::BTreeMap;

/// A keyed map with explicit presence semantics.
///
/// Absence is always `None`; there are no sentinel values.
pub trait KeyedStore<K, V> {
    /// Returns the value stored under `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Returns a mutable reference to the value stored under `key`.
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;

    /// Inserts or replaces the value under `key`, returning the old value.
    fn upsert(&mut self, key: K, value: V) -> Option<V>;

    /// Removes and returns the value under `key`.
    fn evict(&mut self, key: &K) -> Option<V>;

    /// Returns `true` if a value is stored under `key`.
    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes every entry.
    fn clear(&mut self);

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`KeyedStore`] with deterministic key order.
#[derive(Debug, Clone)]
pub struct MemoryStore<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> MemoryStore<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter()
    }
}

impl<K: Ord, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> KeyedStore<K, V> for MemoryStore<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    fn upsert(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn evict(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_and_returns_previous() {
        let mut store = MemoryStore::new();
        assert_eq!(store.upsert("a", 1), None);
        assert_eq!(store.upsert("a", 2), Some(1));
        assert_eq!(store.get(&"a"), Some(&2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evict_removes() {
        let mut store = MemoryStore::new();
        store.upsert("a", 1);
        assert!(store.contains(&"a"));
        assert_eq!(store.evict(&"a"), Some(1));
        assert!(!store.contains(&"a"));
        assert_eq!(store.evict(&"a"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut store = MemoryStore::new();
        store.upsert("a", vec![1]);
        store.get_mut(&"a").unwrap().push(2);
        assert_eq!(store.get(&"a"), Some(&vec![1, 2]));
    }

    #[test]
    fn iter_is_key_ordered() {
        let mut store = MemoryStore::new();
        store.upsert("b", 2);
        store.upsert("a", 1);
        let keys: Vec<_> = store.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        store.clear();
        assert!(store.is_empty());
    }
}
