//! Adaptive Replacement Cache (ARC) store.
//!
//! Balances recency against frequency by keeping two resident lists and two
//! ghost lists, and moving an adaptive boundary `part` between them based on
//! which ghost list is getting hits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ArcStore<K, V> Layout                         │
//! │                                                                         │
//! │   items: FxHashMap<K, Item<K, V>>   (resident entries only)             │
//! │                                                                         │
//! │   T1 (seen once)                     T2 (seen twice or more)            │
//! │   ┌─────────────────────────┐        ┌─────────────────────────┐        │
//! │   │ MRU               LRU   │        │ MRU               LRU   │        │
//! │   │ [k9] ◄──► [k4] ◄──► ..  │        │ [k1] ◄──► [k7] ◄──► ..  │        │
//! │   └─────────────────────────┘        └─────────────────────────┘        │
//! │              │ replace()                        │ replace()             │
//! │              ▼                                  ▼                       │
//! │   B1 (ghosts from T1, keys only)     B2 (ghosts from T2, keys only)     │
//! │                                                                         │
//! │   part: target size of T1                                               │
//! │   • ghost hit in B1 → part grows  (favor recency)                       │
//! │   • ghost hit in B2 → part shrinks (favor frequency)                    │
//! │   part only moves while |T1| + |T2| == size                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Set Flow
//!
//! ```text
//!   set(key):
//!     resident (T1/T2)  → overwrite in place, lists untouched
//!     ghost in B1       → part += max(|B2| / |B1|, 1), replace, B1 → T2
//!     ghost in B2       → part -= max(|B1| / |B2|, 1), replace, B2 → T2
//!     new key:
//!       full && |T1| + |B1| == size:
//!         |T1| < size → drop B1 tail, replace
//!         otherwise   → evict T1 tail outright (no ghost)
//!       else if |T1| + |B1| + |T2| + |B2| >= size:
//!         total == 2 × size → drop B2 tail (B1 tail if B2 is empty)
//!         replace
//!       push to T1
//! ```
//!
//! ## Replace
//!
//! ```text
//!   replace(key), only when full:
//!     |T1| > 0 && ((key ∈ B2 && |T1| == part) || |T1| > part) → T1 tail → B1
//!     else if |T2| > 0                                        → T2 tail → B2
//!     else                                                    → T1 tail → B1
//! ```
//!
//! The order of these checks follows Megiddo & Modha, "ARC: A Self-Tuning,
//! Low Overhead Replacement Cache" (FAST 2003).
//!
//! ## Get Flow
//!
//! ```text
//!   get(key):
//!     in T1 → live: promote to T2 MRU      expired: drop value, key → B1
//!     in T2 → live: move to T2 MRU         expired: drop value, key → B2
//! ```

use std::hash::Hash;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ds::KeyList;
use crate::item::Item;
use crate::store::{Evicted, Store};

/// ARC store: T1/T2 resident lists, B1/B2 ghost lists, adaptive `part`.
pub struct ArcStore<K, V> {
    items: FxHashMap<K, Item<K, V>>,
    t1: KeyList<K>,
    t2: KeyList<K>,
    b1: KeyList<K>,
    b2: KeyList<K>,
    part: usize,
    capacity: usize,
}

impl<K, V> ArcStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty store holding at most `capacity` entries.
    ///
    /// `capacity` must be non-zero; a zero-sized store is rejected by the
    /// builder and is a logic error here.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "ArcStore capacity must be greater than 0");
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            t1: KeyList::with_capacity(capacity),
            t2: KeyList::with_capacity(capacity),
            b1: KeyList::with_capacity(capacity),
            b2: KeyList::with_capacity(capacity),
            part: 0,
            capacity,
        }
    }

    /// Current target size of T1.
    pub fn part(&self) -> usize {
        self.part
    }

    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    pub fn b1_len(&self) -> usize {
        self.b1.len()
    }

    pub fn b2_len(&self) -> usize {
        self.b2.len()
    }

    fn is_full(&self) -> bool {
        self.t1.len() + self.t2.len() == self.capacity
    }

    fn set_part(&mut self, part: usize) {
        if self.is_full() {
            self.part = part;
        }
    }

    /// Moves one resident entry into a ghost list to make room for `key`.
    fn replace(&mut self, key: &K, evicted: &mut Evicted<K, V>) {
        if !self.is_full() {
            return;
        }

        let t1_len = self.t1.len();
        let from_t1 = if t1_len > 0
            && ((self.b2.contains(key) && t1_len == self.part) || t1_len > self.part)
        {
            true
        } else {
            self.t2.is_empty()
        };

        let old = if from_t1 {
            self.t1.pop_back().inspect(|old| self.b1.push_front(old.clone()))
        } else {
            self.t2.pop_back().inspect(|old| self.b2.push_front(old.clone()))
        };

        if let Some(old) = old
            && let Some(item) = self.items.remove(&old)
        {
            evicted.push(item.into_pair());
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self)
    where
        K: std::fmt::Debug,
    {
        self.t1.debug_validate_invariants();
        self.t2.debug_validate_invariants();
        self.b1.debug_validate_invariants();
        self.b2.debug_validate_invariants();

        assert_eq!(
            self.items.len(),
            self.t1.len() + self.t2.len(),
            "items must match resident lists"
        );
        assert!(
            self.t1.len() + self.t2.len() <= self.capacity,
            "resident entries ({}) exceed size ({})",
            self.t1.len() + self.t2.len(),
            self.capacity
        );
        assert!(self.part <= self.capacity, "part exceeds size");

        for key in self.t1.iter() {
            assert!(self.items.contains_key(key), "T1 key {key:?} has no item");
            assert!(!self.t2.contains(key), "key {key:?} in T1 and T2");
            assert!(!self.b1.contains(key) && !self.b2.contains(key));
        }
        for key in self.t2.iter() {
            assert!(self.items.contains_key(key), "T2 key {key:?} has no item");
            assert!(!self.b1.contains(key) && !self.b2.contains(key));
        }
        for key in self.b1.iter() {
            assert!(!self.b2.contains(key), "key {key:?} in B1 and B2");
        }
    }
}

impl<K, V> Store<K, V> for ArcStore<K, V>
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
        match self.items.get_mut(&key) {
            Some(item) => item.update(value, expires_at),
            None => {
                self.items
                    .insert(key.clone(), Item::new(key.clone(), value, expires_at));
            },
        }

        if self.t1.contains(&key) || self.t2.contains(&key) {
            return;
        }

        if self.b1.contains(&key) {
            let step = (self.b2.len() / self.b1.len()).max(1);
            self.set_part((self.part + step).min(self.capacity));
            self.replace(&key, evicted);
            self.b1.remove(&key);
            self.t2.push_front(key);
            return;
        }

        if self.b2.contains(&key) {
            let step = (self.b1.len() / self.b2.len()).max(1);
            self.set_part(self.part.saturating_sub(step));
            self.replace(&key, evicted);
            self.b2.remove(&key);
            self.t2.push_front(key);
            return;
        }

        if self.is_full() && self.t1.len() + self.b1.len() == self.capacity {
            if self.t1.len() < self.capacity {
                self.b1.pop_back();
                self.replace(&key, evicted);
            } else if let Some(old) = self.t1.pop_back()
                && let Some(item) = self.items.remove(&old)
            {
                evicted.push(item.into_pair());
            }
        } else {
            let total = self.t1.len() + self.b1.len() + self.t2.len() + self.b2.len();
            if total >= self.capacity {
                if total == 2 * self.capacity {
                    if !self.b2.is_empty() {
                        self.b2.pop_back();
                    } else {
                        self.b1.pop_back();
                    }
                }
                self.replace(&key, evicted);
            }
        }

        self.t1.push_front(key);
    }

    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V> {
        if self.t1.contains(key) {
            self.t1.remove(key);
            let expired = self.items.get(key).is_none_or(|item| item.is_expired(now));
            if expired {
                if let Some(item) = self.items.remove(key) {
                    evicted.push(item.into_pair());
                }
                self.b1.push_front(key.clone());
                return None;
            }
            self.t2.push_front(key.clone());
            return self.items.get(key).map(|item| &item.value);
        }

        if self.t2.contains(key) {
            let expired = self.items.get(key).is_none_or(|item| item.is_expired(now));
            if expired {
                if let Some(item) = self.items.remove(key) {
                    evicted.push(item.into_pair());
                }
                self.t2.remove(key);
                self.b2.push_front(key.clone());
                return None;
            }
            self.t2.move_to_front(key);
            return self.items.get(key).map(|item| &item.value);
        }

        None
    }

    fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        self.items
            .get(key)
            .filter(|item| !item.is_expired(now))
            .map(|item| &item.value)
    }

    /// Removing a resident key leaves its ghost behind in B1 or B2.
    fn remove(&mut self, key: &K) -> Option<V> {
        if self.t1.remove(key) {
            self.b1.push_front(key.clone());
        } else if self.t2.remove(key) {
            self.b2.push_front(key.clone());
        } else {
            return None;
        }
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

    fn clear(&mut self) {
        self.items.clear();
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.part = 0;
    }
}

impl<K, V> std::fmt::Debug for ArcStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcStore")
            .field("capacity", &self.capacity)
            .field("t1_len", &self.t1.len())
            .field("t2_len", &self.t2.len())
            .field("b1_len", &self.b1.len())
            .field("b2_len", &self.b2.len())
            .field("part", &self.part)
            .finish()
    }
}
