//! Least Recently Used (LRU) store.
//!
//! ## Architecture
//!
//! ```text
//!   map: FxHashMap<K, SlotId>            list: IntrusiveList<Item<K, V>>
//!   ┌──────────┬─────────┐
//!   │  "page1" │  id_0   │──┐           head ─► [page3] ◄──► [page1] ◄──► [page2] ◄── tail
//!   │  "page2" │  id_1   │  │                    MRU                          LRU
//!   │  "page3" │  id_2   │  └─► each id names the node holding that key's Item
//!   └──────────┴─────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation | Effect                                             |
//! |-----------|----------------------------------------------------|
//! | `set`     | overwrite + move to head, or evict tail then push  |
//! | `get`     | move hit to head; expired hit is dropped           |
//! | `peek`    | lookup only                                        |
//! | `remove`  | unlink + free node                                 |
//!
//! All of the above are O(1). Eviction always takes the tail, so the victim
//! is the entry whose last `set`/`get` is oldest.

use std::hash::Hash;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, SlotId};
use crate::item::Item;
use crate::store::{Evicted, Store};

/// LRU store: intrusive recency list plus key index.
pub struct LruStore<K, V> {
    map: FxHashMap<K, SlotId>,
    list: IntrusiveList<Item<K, V>>,
    capacity: usize,
}

impl<K, V> LruStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty store holding at most `capacity` entries.
    ///
    /// `capacity` must be non-zero; a zero-sized store is rejected by the
    /// builder and is a logic error here.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "LruStore capacity must be greater than 0");
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            list: IntrusiveList::with_capacity(capacity),
            capacity,
        }
    }

    /// Drops the tail entry.
    fn evict_tail(&mut self) -> Option<(K, V)> {
        let item = self.list.pop_back()?;
        self.map.remove(&item.key);
        Some(item.into_pair())
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.list.iter().map(|item| &item.key)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        assert_eq!(self.map.len(), self.list.len());
        assert!(self.capacity == 0 || self.list.len() <= self.capacity);
        for (key, &id) in &self.map {
            let item = self.list.get(id).expect("map points at freed node");
            assert!(&item.key == key, "map points at wrong node");
        }
    }
}

impl<K, V> Store<K, V> for LruStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn set(
        &mut self,
        key: K,
        value: V,
        expires_at: Option<Instant>,
        _now: Instant,
        evicted: &mut Evicted<K, V>,
    ) {
        if let Some(&id) = self.map.get(&key) {
            self.list.move_to_front(id);
            if let Some(item) = self.list.get_mut(id) {
                item.update(value, expires_at);
            }
            return;
        }

        if self.list.len() >= self.capacity
            && let Some(victim) = self.evict_tail()
        {
            evicted.push(victim);
        }

        let id = self.list.push_front(Item::new(key.clone(), value, expires_at));
        self.map.insert(key, id);
    }

    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V> {
        let id = *self.map.get(key)?;
        let expired = self.list.get(id)?.is_expired(now);
        if expired {
            self.map.remove(key);
            if let Some(item) = self.list.remove(id) {
                evicted.push(item.into_pair());
            }
            return None;
        }
        self.list.move_to_front(id);
        self.list.get(id).map(|item| &item.value)
    }

    fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        let id = *self.map.get(key)?;
        self.list
            .get(id)
            .filter(|item| !item.is_expired(now))
            .map(|item| &item.value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.map.remove(key)?;
        self.list.remove(id).map(|item| item.value)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn for_each(&self, f: &mut dyn FnMut(&Item<K, V>)) {
        for item in self.list.iter() {
            f(item);
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }
}

impl<K, V> std::fmt::Debug for LruStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStore")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn set<V>(store: &mut LruStore<&'static str, V>, key: &'static str, value: V) -> Evicted<&'static str, V> {
        let mut evicted = Vec::new();
        store.set(key, value, None, Instant::now(), &mut evicted);
        evicted
    }

    #[test]
    fn lru_evicts_tail_on_overflow() {
        let mut store = LruStore::new(2);
        assert!(set(&mut store, "a", 1).is_empty());
        assert!(set(&mut store, "b", 2).is_empty());

        let evicted = set(&mut store, "c", 3);
        assert_eq!(evicted, vec![("a", 1)]);
        assert_eq!(store.len(), 2);
        store.debug_validate_invariants();
    }

    #[test]
    fn lru_get_protects_from_eviction() {
        let mut store = LruStore::new(2);
        set(&mut store, "a", 1);
        set(&mut store, "b", 2);

        let mut evicted = Vec::new();
        assert_eq!(store.get(&"a", Instant::now(), &mut evicted), Some(&1));

        let evicted = set(&mut store, "c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
        assert_eq!(
            store.keys_by_recency().copied().collect::<Vec<_>>(),
            vec!["c", "a"]
        );
    }

    #[test]
    fn lru_overwrite_moves_to_front_without_growth() {
        let mut store = LruStore::new(2);
        set(&mut store, "a", 1);
        set(&mut store, "b", 2);
        assert!(set(&mut store, "a", 10).is_empty());

        assert_eq!(store.len(), 2);
        assert_eq!(store.peek(&"a", Instant::now()), Some(&10));
        assert_eq!(set(&mut store, "c", 3), vec![("b", 2)]);
    }

    #[test]
    fn lru_get_drops_expired_entry() {
        let mut store = LruStore::new(4);
        let now = Instant::now();
        let mut evicted = Vec::new();
        store.set("a", 1, Some(now + Duration::from_secs(1)), now, &mut evicted);

        let later = now + Duration::from_secs(1);
        assert_eq!(store.peek(&"a", later), None);
        assert_eq!(store.get(&"a", later, &mut evicted), None);
        assert_eq!(evicted, vec![("a", 1)]);
        assert_eq!(store.len(), 0);
        store.debug_validate_invariants();
    }

    #[test]
    fn lru_remove_and_clear() {
        let mut store = LruStore::new(4);
        set(&mut store, "a", 1);
        set(&mut store, "b", 2);

        assert_eq!(store.remove(&"a"), Some(1));
        assert_eq!(store.remove(&"a"), None);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        store.debug_validate_invariants();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn lru_zero_capacity_is_rejected() {
        let _ = LruStore::<u32, u32>::new(0);
    }
}
