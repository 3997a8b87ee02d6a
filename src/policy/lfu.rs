//! Least Frequently Used (LFU) store.
//!
//! Entries are grouped into frequency buckets kept in ascending order in an
//! [`IntrusiveList`]. Every entry remembers the bucket it currently sits in,
//! so a hit moves it one bucket to the right in O(1).
//!
//! ## Architecture
//!
//! ```text
//!   buckets: IntrusiveList<FreqBucket<K>>
//!
//!   head ─► [freq 0 {d, e}] ◄──► [freq 1 {}] ◄──► [freq 2 {b}] ◄──► [freq 3 {a}]
//!            ▲                    (empty: kept,                        ▲
//!            │                     skipped on evict)                  │
//!   entries: FxHashMap<K, LfuEntry>  ── entry.bucket ─────────────────┘
//! ```
//!
//! ## Frequency Lifecycle
//!
//! ```text
//!   set(new key)  ──► freq 0 bucket (always the list head)
//!   get(hit)      ──► freq + 1 bucket, created right after the current one
//!                     when the next bucket is missing or has another freq
//!   set(existing) ──► value/deadline overwritten, freq unchanged
//!   evict(n)      ──► walk buckets from the head, removing members until n
//!                     entries are gone
//! ```
//!
//! Buckets are never pruned once created, so the bucket count is bounded by
//! the highest frequency any entry has reached. Within one bucket the victim
//! is whichever member the set yields first; there is no recency tie-break.

use std::hash::Hash;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ds::{IntrusiveList, SlotId};
use crate::item::Item;
use crate::store::{Evicted, Store};

#[derive(Debug)]
struct FreqBucket<K> {
    freq: u64,
    keys: FxHashSet<K>,
}

impl<K> FreqBucket<K> {
    fn new(freq: u64) -> Self {
        Self {
            freq,
            keys: FxHashSet::default(),
        }
    }
}

struct LfuEntry<K, V> {
    item: Item<K, V>,
    bucket: SlotId,
}

/// LFU store backed by a list of frequency buckets.
pub struct LfuStore<K, V> {
    entries: FxHashMap<K, LfuEntry<K, V>>,
    buckets: IntrusiveList<FreqBucket<K>>,
    zero: SlotId,
    capacity: usize,
}

impl<K, V> LfuStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty store holding at most `capacity` entries.
    ///
    /// `capacity` must be non-zero; a zero-sized store is rejected by the
    /// builder and is a logic error here.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "LfuStore capacity must be greater than 0");
        let mut buckets = IntrusiveList::new();
        let zero = buckets.push_front(FreqBucket::new(0));
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            buckets,
            zero,
            capacity,
        }
    }

    /// Access count recorded for `key`.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let entry = self.entries.get(key)?;
        self.buckets.get(entry.bucket).map(|bucket| bucket.freq)
    }

    /// Number of buckets, empty ones included.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Moves `key` from its bucket into the `freq + 1` bucket.
    fn increment(&mut self, key: &K) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let current = entry.bucket;
        let next_freq = match self.buckets.get_mut(current) {
            Some(bucket) => {
                bucket.keys.remove(key);
                bucket.freq + 1
            },
            None => return,
        };

        let next = match self.buckets.next_id(current) {
            Some(id) if self.buckets.get(id).is_some_and(|b| b.freq == next_freq) => id,
            _ => match self.buckets.insert_after(current, FreqBucket::new(next_freq)) {
                Some(id) => id,
                None => return,
            },
        };

        if let Some(bucket) = self.buckets.get_mut(next) {
            bucket.keys.insert(key.clone());
        }
        entry.bucket = next;
    }

    /// Removes up to `count` entries, lowest frequency first.
    fn evict(&mut self, count: usize, evicted: &mut Evicted<K, V>) {
        let mut victims = Vec::with_capacity(count);
        let mut cursor = Some(self.zero);
        while let Some(id) = cursor {
            if victims.len() >= count {
                break;
            }
            if let Some(bucket) = self.buckets.get(id) {
                let wanted = count - victims.len();
                victims.extend(bucket.keys.iter().take(wanted).cloned());
            }
            cursor = self.buckets.next_id(id);
        }

        for key in victims {
            if let Some(value) = self.remove(&key) {
                evicted.push((key, value));
            }
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.buckets.debug_validate_invariants();
        assert_eq!(self.buckets.front_id(), Some(self.zero));
        assert!(self.capacity == 0 || self.entries.len() <= self.capacity);

        let mut members = 0usize;
        let mut last_freq = None;
        for bucket in self.buckets.iter() {
            if let Some(prev) = last_freq {
                assert!(bucket.freq > prev, "buckets out of order");
            }
            last_freq = Some(bucket.freq);
            members += bucket.keys.len();
        }
        assert_eq!(members, self.entries.len());

        for (key, entry) in &self.entries {
            let bucket = self.buckets.get(entry.bucket).expect("dangling bucket");
            assert!(bucket.keys.contains(key), "entry missing from its bucket");
        }
    }
}

impl<K, V> Store<K, V> for LfuStore<K, V>
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
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.item.update(value, expires_at);
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict(1, evicted);
        }

        if let Some(bucket) = self.buckets.get_mut(self.zero) {
            bucket.keys.insert(key.clone());
        }
        let entry = LfuEntry {
            item: Item::new(key.clone(), value, expires_at),
            bucket: self.zero,
        };
        self.entries.insert(key, entry);
    }

    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V> {
        let expired = self.entries.get(key)?.item.is_expired(now);
        if expired {
            if let Some(value) = self.remove(key) {
                evicted.push((key.clone(), value));
            }
            return None;
        }
        self.increment(key);
        self.entries.get(key).map(|entry| &entry.item.value)
    }

    fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|entry| !entry.item.is_expired(now))
            .map(|entry| &entry.item.value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        if let Some(bucket) = self.buckets.get_mut(entry.bucket) {
            bucket.keys.remove(key);
        }
        Some(entry.item.value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn for_each(&self, f: &mut dyn FnMut(&Item<K, V>)) {
        for entry in self.entries.values() {
            f(&entry.item);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.buckets.clear();
        self.zero = self.buckets.push_front(FreqBucket::new(0));
    }
}

impl<K, V> std::fmt::Debug for LfuStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LfuStore")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}
