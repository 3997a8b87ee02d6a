//! Storage capability shared by every eviction policy.
//!
//! A store owns the entries and their ordering metadata; the cache handle on
//! top of it owns locking, statistics, callbacks and loading. Keeping the
//! policy logic behind this trait lets [`Cache`](crate::Cache) stay the same
//! for LRU, LFU, ARC and Simple.
//!
//! Entries a store drops on its own (capacity eviction, expired-on-read) are
//! appended to the caller's `evicted` buffer in the order they were dropped,
//! so that callbacks can run once the cache lock is released.

use std::time::Instant;

use crate::item::Item;

/// Buffer of `(key, value)` pairs dropped by a store operation.
pub type Evicted<K, V> = Vec<(K, V)>;

/// Operations every policy store provides.
pub trait Store<K, V> {
    /// Inserts or overwrites `key`.
    ///
    /// Entries displaced to make room are pushed onto `evicted`.
    fn set(
        &mut self,
        key: K,
        value: V,
        expires_at: Option<Instant>,
        now: Instant,
        evicted: &mut Evicted<K, V>,
    );

    /// Returns the live value for `key`, updating recency/frequency state.
    ///
    /// An expired entry found here is dropped, pushed onto `evicted`, and
    /// reported as a miss.
    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V>;

    /// Returns the live value for `key` without touching policy state.
    fn peek(&self, key: &K, now: Instant) -> Option<&V>;

    /// `true` if a live entry exists for `key`.
    fn has(&self, key: &K, now: Instant) -> bool {
        self.peek(key, now).is_some()
    }

    /// Removes `key`, returning its value if it was resident.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Number of resident entries, expired or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound; `0` means unbounded.
    fn capacity(&self) -> usize;

    /// Visits every resident entry.
    fn for_each(&self, f: &mut dyn FnMut(&Item<K, V>));

    /// Removes every entry expired at `now` and returns them.
    fn purge_expired(&mut self, now: Instant) -> Evicted<K, V>
    where
        K: Clone,
    {
        let mut expired = Vec::new();
        self.for_each(&mut |item| {
            if item.is_expired(now) {
                expired.push(item.key.clone());
            }
        });
        expired
            .into_iter()
            .filter_map(|key| self.remove(&key).map(|value| (key, value)))
            .collect()
    }

    /// Drops every entry and resets policy state.
    fn clear(&mut self);
}
