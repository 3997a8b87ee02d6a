//! Eviction policies and the tagged store that dispatches between them.

pub mod arc;
pub mod lfu;
pub mod lru;
pub mod simple;

use std::hash::Hash;
use std::time::Instant;

use crate::builder::CachePolicy;
use crate::item::Item;
use crate::store::{Evicted, Store};

pub use arc::ArcStore;
pub use lfu::LfuStore;
pub use lru::LruStore;
pub use simple::SimpleStore;

/// One policy store, selected at build time.
pub enum PolicyStore<K, V> {
    Lru(LruStore<K, V>),
    Lfu(LfuStore<K, V>),
    Arc(ArcStore<K, V>),
    Simple(SimpleStore<K, V>),
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            PolicyStore::Lru($store) => $body,
            PolicyStore::Lfu($store) => $body,
            PolicyStore::Arc($store) => $body,
            PolicyStore::Simple($store) => $body,
        }
    };
}

impl<K, V> PolicyStore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(policy: CachePolicy, size: usize) -> Self {
        match policy {
            CachePolicy::Lru => PolicyStore::Lru(LruStore::new(size)),
            CachePolicy::Lfu => PolicyStore::Lfu(LfuStore::new(size)),
            CachePolicy::Arc => PolicyStore::Arc(ArcStore::new(size)),
            CachePolicy::Simple => PolicyStore::Simple(SimpleStore::new(size)),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        match self {
            PolicyStore::Lru(_) => CachePolicy::Lru,
            PolicyStore::Lfu(_) => CachePolicy::Lfu,
            PolicyStore::Arc(_) => CachePolicy::Arc,
            PolicyStore::Simple(_) => CachePolicy::Simple,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self)
    where
        K: std::fmt::Debug,
    {
        dispatch!(self, s => s.debug_validate_invariants())
    }
}

impl<K, V> Store<K, V> for PolicyStore<K, V>
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
        dispatch!(self, s => s.set(key, value, expires_at, now, evicted))
    }

    fn get(&mut self, key: &K, now: Instant, evicted: &mut Evicted<K, V>) -> Option<&V> {
        dispatch!(self, s => s.get(key, now, evicted))
    }

    fn peek(&self, key: &K, now: Instant) -> Option<&V> {
        dispatch!(self, s => s.peek(key, now))
    }

    fn has(&self, key: &K, now: Instant) -> bool {
        dispatch!(self, s => s.has(key, now))
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        dispatch!(self, s => s.remove(key))
    }

    fn len(&self) -> usize {
        dispatch!(self, s => s.len())
    }

    fn capacity(&self) -> usize {
        dispatch!(self, s => s.capacity())
    }

    fn for_each(&self, f: &mut dyn FnMut(&Item<K, V>)) {
        dispatch!(self, s => s.for_each(f))
    }

    fn purge_expired(&mut self, now: Instant) -> Evicted<K, V> {
        dispatch!(self, s => s.purge_expired(now))
    }

    fn clear(&mut self) {
        dispatch!(self, s => s.clear())
    }
}

impl<K, V> std::fmt::Debug for PolicyStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        dispatch!(self, s => std::fmt::Debug::fmt(s, f))
    }
}

#[cfg(test)]
mod property_tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    const POLICIES: [CachePolicy; 4] = [
        CachePolicy::Lru,
        CachePolicy::Lfu,
        CachePolicy::Arc,
        CachePolicy::Simple,
    ];

    #[derive(Debug, Clone)]
    enum Operation {
        Set(u32, u32),
        Get(u32),
        Remove(u32),
    }

    fn operation_strategy(keys: u32) -> impl Strategy<Value = Operation> {
        prop_oneof![
            (0..keys, 0u32..100).prop_map(|(k, v)| Operation::Set(k, v)),
            (0..keys).prop_map(Operation::Get),
            (0..keys).prop_map(Operation::Remove),
        ]
    }

    fn capacity_and_ops() -> impl Strategy<Value = (usize, Vec<Operation>)> {
        (1u32..20).prop_flat_map(|capacity| {
            (
                Just(capacity as usize),
                prop::collection::vec(operation_strategy(capacity), 0..200),
            )
        })
    }

    proptest! {
        /// With no more distinct keys than capacity, every key returns its
        /// last written value.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_live_keys_retrievable_within_capacity((capacity, ops) in capacity_and_ops()) {
            let now = Instant::now();
            for policy in POLICIES {
                let mut store = PolicyStore::new(policy, capacity);
                let mut model: HashMap<u32, u32> = HashMap::new();
                let mut evicted = Vec::new();

                for op in &ops {
                    match *op {
                        Operation::Set(k, v) => {
                            store.set(k, v, None, now, &mut evicted);
                            model.insert(k, v);
                        },
                        Operation::Get(k) => {
                            prop_assert_eq!(store.get(&k, now, &mut evicted).copied(), model.get(&k).copied());
                        },
                        Operation::Remove(k) => {
                            prop_assert_eq!(store.remove(&k), model.remove(&k));
                        },
                    }
                    store.debug_validate_invariants();
                }

                prop_assert!(evicted.is_empty(), "{} evicted within capacity", policy);
                prop_assert_eq!(store.len(), model.len());
            }
        }

        /// Bounded policies never hold more than `capacity` entries.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_len_within_capacity(
            capacity in 1usize..50,
            ops in prop::collection::vec((0u32..200, 0u32..100), 0..300)
        ) {
            let now = Instant::now();
            for policy in POLICIES {
                let mut store = PolicyStore::new(policy, capacity);
                let mut evicted = Vec::new();
                for &(key, value) in &ops {
                    store.set(key, value, None, now, &mut evicted);
                    if key % 3 == 0 {
                        store.get(&key, now, &mut evicted);
                    }
                    prop_assert!(store.len() <= capacity);
                }
                store.debug_validate_invariants();
            }
        }
    }
}
