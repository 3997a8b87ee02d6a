//! Recency-ordered list of keys with O(1) membership.
//!
//! Used by ARC for its four lists: T1/T2 hold the keys of resident entries,
//! B1/B2 hold ghost keys (no values). Implemented as an `IntrusiveList` plus
//! a key index.
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        list: IntrusiveList<K>
//!   ┌─────────┬─────────┐              head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!   │  key A  │  id_1   │                 MRU                       LRU
//!   │  key B  │  id_2   │
//!   └─────────┴─────────┘
//! ```
//!
//! Unlike a bounded ghost list this never evicts on its own; callers decide
//! when to drop the tail.
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;

#[derive(Debug)]
pub struct KeyList<K> {
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
}

impl<K> KeyList<K> {
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<K> KeyList<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            list: IntrusiveList::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: IntrusiveList::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Puts `key` at the MRU position, moving it if already present.
    pub fn push_front(&mut self, key: K) {
        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            return;
        }
        let id = self.list.push_front(key.clone());
        self.index.insert(key, id);
    }

    /// Moves an existing key to the MRU position; `false` if absent.
    pub fn move_to_front(&mut self, key: &K) -> bool {
        match self.index.get(key) {
            Some(&id) => self.list.move_to_front(id),
            None => false,
        }
    }

    /// Removes and returns the LRU key.
    pub fn pop_back(&mut self) -> Option<K> {
        let key = self.list.pop_back()?;
        self.index.remove(&key);
        Some(key)
    }

    /// Removes `key`; returns `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(id) => {
                self.list.remove(id);
                true
            },
            None => false,
        }
    }

    /// Iterates keys from MRU to LRU.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.list.iter()
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        assert_eq!(self.list.len(), self.index.len());
        for (key, &id) in &self.index {
            assert!(self.list.get(id) == Some(key), "index points at wrong node");
        }
    }
}

impl<K> Default for KeyList<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_list_push_and_pop_lru() {
        let mut keys = KeyList::new();
        keys.push_front("a");
        keys.push_front("b");
        keys.push_front("c");
        assert_eq!(keys.len(), 3);

        assert_eq!(keys.pop_back(), Some("a"));
        assert!(!keys.contains(&"a"));
        assert_eq!(keys.iter().copied().collect::<Vec<_>>(), vec!["c", "b"]);
        keys.debug_validate_invariants();
    }

    #[test]
    fn key_list_push_existing_moves_to_front() {
        let mut keys = KeyList::new();
        keys.push_front(1);
        keys.push_front(2);
        keys.push_front(1);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.pop_back(), Some(2));
        keys.debug_validate_invariants();
    }

    #[test]
    fn key_list_remove_and_move() {
        let mut keys = KeyList::with_capacity(4);
        keys.push_front("x");
        keys.push_front("y");

        assert!(keys.move_to_front(&"x"));
        assert!(!keys.move_to_front(&"missing"));
        assert_eq!(keys.iter().copied().collect::<Vec<_>>(), vec!["x", "y"]);

        assert!(keys.remove(&"x"));
        assert!(!keys.remove(&"x"));
        assert_eq!(keys.len(), 1);

        keys.clear();
        assert!(keys.is_empty());
        assert_eq!(keys.pop_back(), None);
    }
}
