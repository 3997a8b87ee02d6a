//! Simple store: a flat map bounded mostly by expiration.
//!
//! There is no ordering metadata at all. When a bounded store overflows it
//! makes room in two passes over the map's native iteration order:
//!
//! ```text
//!   evict(n):
//!     pass 1: remove entries already expired at `now`
//!     pass 2: still short → remove arbitrary entries until n are gone
//! ```
//!
//! A size of `0` means unbounded; entries then leave only through expiry,
//! `remove`, `purge` or `flush`.

use std::hash::Hash;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::item::Item;
use crate::store::{Evicted, Store};

pub struct SimpleStore<K, V> {
    items: FxHashMap<K, Item<K, V>>,
    capacity: usize,
}

impl<K, V> SimpleStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity,
        }
    }

    fn evict(&mut self, count: usize, now: Instant, evicted: &mut Evicted<K, V>) {
        let mut victims: Vec<K> = self
            .items
            .values()
            .filter(|item| item.is_expired(now))
            .take(count)
            .map(|item| item.key.clone())
            .collect();

        if victims.len() < count {
            let wanted = count - victims.len();
            let extra: Vec<K> = self
                .items
                .keys()
                .filter(|key| !victims.contains(key))
                .take(wanted)
                .cloned()
                .collect();
            victims.extend(extra);
        }

        for key in victims {
            if let Some(item) = self.items.remove(&key) {
                evicted.push(item.into_pair());
            }
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert!(self.capacity == 0 || self.items.len() <= self.capacity);
        for (key, item) in &self.items {
            assert!(&item.key == key, "item stored under the wrong key");
        }
    }
}

impl<K, V> Store<K, V> for SimpleStore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn set(
        &mut self,
        key: K,
        value: V,
        expires_at: Option<Instant>,
        now: Instant,
        evicted: &mut Evicted<K, V>,
    ) {
        if let Some(item) = self.items.get_mut(&key) {
            item.update(value, expires_at);
            return;
        }

        if self.capacity > 0 && self.items.len() >= self.capacity {
            let over = self.items.len() + 1 - self.capacity;
            self.evict(over, now, evicted);
        }

        self.items
            .insert(key.clone(), Item::new(key, value, expires_at));
    }

    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V> {
        let expired = self.items.get(key)?.is_expired(now);
        if expired {
            if let Some(item) = self.items.remove(key) {
                evicted.push(item.into_pair());
            }
            return None;
        }
        self.items.get(key).map(|item| &item.value)
    }

    fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        self.items
            .get(key)
            .filter(|item| !item.is_expired(now))
            .map(|item| &item.value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.items.remove(key).map(|item| item.value)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn for_each(&self, f: &mut dyn FnMut(&Item<K, V>)) {
        for item in self.items.values() {
            f(item);
        }
    }

    fn purge_expired(&mut self, now: Instant) -> Evicted<K, V> {
        let expired: Vec<K> = self
            .items
            .values()
            .filter(|item| item.is_expired(now))
            .map(|item| item.key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| self.items.remove(&key).map(Item::into_pair))
            .collect()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

impl<K, V> std::fmt::Debug for SimpleStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleStore")
            .field("capacity", &self.capacity)
            .field("len", &self.items.len())
            .finish()
    }
}
