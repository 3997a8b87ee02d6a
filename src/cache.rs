//! The thread-safe cache handle.
//!
//! [`Cache`] wraps one [`PolicyStore`] behind a single `RwLock` and adds the
//! parts every policy shares: expiration defaults, statistics, callbacks,
//! single-flight loading and the optional janitor.
//!
//! ## Architecture
//!
//! ```text
//!   Cache<K, V> (Clone) ──► Arc<CacheShared<K, V>>
//!                              │
//!                              ├── store: RwLock<PolicyStore<K, V>>   LRU | LFU | ARC | Simple
//!                              ├── expiration: Option<Duration>       default TTL
//!                              ├── hooks: Hooks<K, V>                 added / evicted / purge_visitor
//!                              ├── loader: Option<Loader<K, V>>
//!                              ├── group: Arc<LoadGroup<K, V>>        one load per key
//!                              ├── stats: Stats                       atomic hits / misses
//!                              ├── clock: Arc<dyn Clock>
//!                              └── janitor: Mutex<Option<Janitor>>    holds a Weak back-reference
//! ```
//!
//! ## Locking
//!
//! | Operation                                           | Store lock |
//! |-----------------------------------------------------|------------|
//! | `set`, `set_nx`, `get`, `get_if_present`, `remove`  | write      |
//! | `purge`, `flush`                                    | write      |
//! | `has`, `keys`, `get_all`, `len`                     | read       |
//!
//! Callbacks never run under the store lock. Entries the store drops are
//! collected while locked and handed to the hooks after the guard is
//! released, in the order they were dropped, so a hook may call back into the
//! same cache. The loader also runs unlocked; the load group's lock is always
//! taken before the store lock.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use polycache::{CacheBuilder, Expiration};
//!
//! let cache = CacheBuilder::new(2)
//!     .lru()
//!     .expiration(Duration::from_secs(60))
//!     .build();
//!
//! cache.set("a", 1, Expiration::Default).unwrap();
//! cache.set("b", 2, Expiration::Never).unwrap();
//! assert_eq!(cache.get(&"a"), Ok(1));
//!
//! cache.set("c", 3, Expiration::Default).unwrap();
//! assert!(!cache.has(&"b"));
//! assert_eq!(cache.hit_count(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use log::{trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::builder::CachePolicy;
use crate::clock::Clock;
use crate::error::{CacheError, LoadError};
use crate::item::Expiration;
use crate::janitor::Janitor;
use crate::load::LoadGroup;
use crate::policy::PolicyStore;
use crate::stats::{Stats, StatsSnapshot};
use crate::store::{Evicted, Store};

/// Callback receiving a key and its value.
pub type EntryFn<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Loader producing a value for a missing key.
pub type LoaderFn<K, V> = Arc<dyn Fn(&K) -> Result<V, LoadError> + Send + Sync>;

/// Loader that also picks the entry's TTL; `None` falls back to the default.
pub type ExpiringLoaderFn<K, V> =
    Arc<dyn Fn(&K) -> Result<(V, Option<Duration>), LoadError> + Send + Sync>;

/// Optional entry callbacks.
pub struct Hooks<K, V> {
    /// Runs after every `set`, including overwrites and loaded values.
    pub added: Option<EntryFn<K, V>>,
    /// Runs for capacity evictions, expired entries dropped on read, and
    /// `remove`.
    pub evicted: Option<EntryFn<K, V>>,
    /// Runs for each entry removed by `purge`.
    pub purge_visitor: Option<EntryFn<K, V>>,
}

impl<K, V> Default for Hooks<K, V> {
    fn default() -> Self {
        Self {
            added: None,
            evicted: None,
            purge_visitor: None,
        }
    }
}

impl<K, V> Clone for Hooks<K, V> {
    fn clone(&self) -> Self {
        Self {
            added: self.added.clone(),
            evicted: self.evicted.clone(),
            purge_visitor: self.purge_visitor.clone(),
        }
    }
}

pub(crate) enum Loader<K, V> {
    Plain(LoaderFn<K, V>),
    WithExpiration(ExpiringLoaderFn<K, V>),
}

impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        match self {
            Loader::Plain(f) => Loader::Plain(Arc::clone(f)),
            Loader::WithExpiration(f) => Loader::WithExpiration(Arc::clone(f)),
        }
    }
}

impl<K, V> Loader<K, V> {
    fn call(&self, key: &K) -> Result<(V, Expiration), LoadError> {
        match self {
            Loader::Plain(f) => f(key).map(|value| (value, Expiration::Default)),
            Loader::WithExpiration(f) => f(key).map(|(value, ttl)| (value, Expiration::from(ttl))),
        }
    }
}

pub(crate) struct CacheShared<K, V> {
    store: RwLock<PolicyStore<K, V>>,
    expiration: Option<Duration>,
    hooks: Hooks<K, V>,
    loader: Option<Loader<K, V>>,
    group: Arc<LoadGroup<K, V>>,
    stats: Stats,
    clock: Arc<dyn Clock>,
    janitor: Mutex<Option<Janitor>>,
}

/// Everything the builder hands over to construct a cache.
pub(crate) struct CacheParts<K, V> {
    pub(crate) store: PolicyStore<K, V>,
    pub(crate) expiration: Option<Duration>,
    pub(crate) hooks: Hooks<K, V>,
    pub(crate) loader: Option<Loader<K, V>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<K, V> CacheShared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: K, value: V, expiration: Expiration) {
        let now = self.clock.now();
        let expires_at = expiration.deadline(now, self.expiration);
        let added = self
            .hooks
            .added
            .as_ref()
            .map(|_| (key.clone(), value.clone()));

        let mut evicted = Vec::new();
        self.store
            .write()
            .set(key, value, expires_at, now, &mut evicted);

        self.notify_evicted(evicted);
        if let (Some(hook), Some((key, value))) = (&self.hooks.added, added) {
            hook(&key, &value);
        }
    }

    fn set_nx(&self, key: K, value: V, expiration: Expiration) -> Result<(), CacheError> {
        let now = self.clock.now();
        let expires_at = expiration.deadline(now, self.expiration);
        let added = self
            .hooks
            .added
            .as_ref()
            .map(|_| (key.clone(), value.clone()));

        let mut evicted = Vec::new();
        {
            let mut store = self.store.write();
            if store.has(&key, now) {
                return Err(CacheError::KeyAlreadyExists);
            }
            store.set(key, value, expires_at, now, &mut evicted);
        }

        self.notify_evicted(evicted);
        if let (Some(hook), Some((key, value))) = (&self.hooks.added, added) {
            hook(&key, &value);
        }
        Ok(())
    }

    /// Store lookup with bookkeeping and stats.
    fn lookup(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut evicted = Vec::new();
        let found = self.store.write().get(key, now, &mut evicted).cloned();
        self.notify_evicted(evicted);

        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Store lookup with no side effects.
    fn peek(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.store.read().peek(key, now).cloned()
    }

    fn load_and_store(&self, key: K, loader: &Loader<K, V>) -> Result<V, CacheError> {
        let (value, expiration) = match loader.call(&key) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("loader failed: {err}");
                return Err(CacheError::KeyNotFound);
            },
        };
        self.set(key, value.clone(), expiration);
        Ok(value)
    }

    fn purge(&self) {
        let now = self.clock.now();
        let purged = self.store.write().purge_expired(now);
        if purged.is_empty() {
            return;
        }
        trace!("purged {} expired entries", purged.len());
        if let Some(hook) = &self.hooks.purge_visitor {
            for (key, value) in &purged {
                hook(key, value);
            }
        }
    }

    fn notify_evicted(&self, evicted: Evicted<K, V>) {
        if evicted.is_empty() {
            return;
        }
        trace!("evicted {} entries", evicted.len());
        if let Some(hook) = &self.hooks.evicted {
            for (key, value) in &evicted {
                hook(key, value);
            }
        }
    }
}

/// Thread-safe cache handle. Clones share the same entries.
pub struct Cache<K, V> {
    shared: Arc<CacheShared<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_parts(parts: CacheParts<K, V>) -> Self {
        let shared = CacheShared {
            store: RwLock::new(parts.store),
            expiration: parts.expiration,
            hooks: parts.hooks,
            loader: parts.loader,
            group: Arc::new(LoadGroup::new()),
            stats: Stats::new(),
            clock: parts.clock,
            janitor: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Starts the janitor for this cache.
    pub(crate) fn start_janitor(&self, interval: Duration) -> std::io::Result<()> {
        let janitor = Janitor::spawn(interval, Arc::downgrade(&self.shared), CacheShared::purge)?;
        *self.shared.janitor.lock() = Some(janitor);
        Ok(())
    }

    /// Inserts or overwrites `key`.
    ///
    /// Always succeeds for the shipped policies; the `Result` leaves room for
    /// stores that refuse writes.
    pub fn set(&self, key: K, value: V, expiration: impl Into<Expiration>) -> Result<(), CacheError> {
        self.shared.set(key, value, expiration.into());
        Ok(())
    }

    /// Inserts `key` only if no live entry exists for it.
    pub fn set_nx(
        &self,
        key: K,
        value: V,
        expiration: impl Into<Expiration>,
    ) -> Result<(), CacheError> {
        self.shared.set_nx(key, value, expiration.into())
    }

    /// Returns the value for `key`.
    ///
    /// On a miss with a loader configured, loads the value and blocks until
    /// it is available. Concurrent misses on the same key share one load.
    pub fn get(&self, key: &K) -> Result<V, CacheError> {
        if let Some(value) = self.shared.lookup(key) {
            return Ok(value);
        }
        self.load(key, true)
    }

    /// Like [`get`](Self::get), but a miss only schedules a background load
    /// and returns [`CacheError::KeyNotFound`] straight away.
    pub fn get_if_present(&self, key: &K) -> Result<V, CacheError> {
        if let Some(value) = self.shared.lookup(key) {
            return Ok(value);
        }
        self.load(key, false)
    }

    fn load(&self, key: &K, wait: bool) -> Result<V, CacheError> {
        let Some(loader) = self.shared.loader.clone() else {
            return Err(CacheError::KeyNotFound);
        };
        let shared = Arc::clone(&self.shared);
        let owned = key.clone();
        self.shared.group.load(
            key,
            || self.shared.peek(key),
            move || shared.load_and_store(owned, &loader),
            wait,
        )
    }

    /// `true` if a live entry exists. Touches neither policy state nor stats.
    pub fn has(&self, key: &K) -> bool {
        let now = self.shared.clock.now();
        self.shared.store.read().has(key, now)
    }

    /// Removes `key`, running the evicted callback if it was resident.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.shared.store.write().remove(key);
        match removed {
            Some(value) => {
                if let Some(hook) = &self.shared.hooks.evicted {
                    hook(key, &value);
                }
                true
            },
            None => false,
        }
    }

    /// Snapshot of the resident keys, optionally skipping expired ones.
    pub fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.shared.clock.now();
        let store = self.shared.store.read();
        let mut keys = Vec::with_capacity(store.len());
        store.for_each(&mut |item| {
            if !check_expired || !item.is_expired(now) {
                keys.push(item.key.clone());
            }
        });
        keys
    }

    /// Snapshot of the resident entries, optionally skipping expired ones.
    pub fn get_all(&self, check_expired: bool) -> HashMap<K, V> {
        let now = self.shared.clock.now();
        let store = self.shared.store.read();
        let mut all = HashMap::with_capacity(store.len());
        store.for_each(&mut |item| {
            if !check_expired || !item.is_expired(now) {
                all.insert(item.key.clone(), item.value.clone());
            }
        });
        all
    }

    /// Number of resident entries, optionally skipping expired ones.
    pub fn len(&self, check_expired: bool) -> usize {
        let store = self.shared.store.read();
        if !check_expired {
            return store.len();
        }
        let now = self.shared.clock.now();
        let mut live = 0;
        store.for_each(&mut |item| {
            if !item.is_expired(now) {
                live += 1;
            }
        });
        live
    }

    /// `true` when the store holds no entries, expired ones included.
    pub fn is_empty(&self) -> bool {
        self.len(false) == 0
    }

    /// Removes every expired entry, running the purge visitor for each.
    pub fn purge(&self) {
        self.shared.purge();
    }

    /// Drops every entry without running callbacks.
    pub fn flush(&self) {
        self.shared.store.write().clear();
    }

    /// Number of `get`/`get_if_present` calls that found a live entry.
    pub fn hit_count(&self) -> u64 {
        self.shared.stats.hit_count()
    }

    /// Number of `get`/`get_if_present` calls that missed.
    pub fn miss_count(&self) -> u64 {
        self.shared.stats.miss_count()
    }

    /// Hits plus misses.
    pub fn lookup_count(&self) -> u64 {
        self.shared.stats.lookup_count()
    }

    /// Hits divided by lookups, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        self.shared.stats.hit_rate()
    }

    /// Point-in-time copy of the hit and miss counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Eviction policy the cache was built with.
    pub fn policy(&self) -> CachePolicy {
        self.shared.store.read().policy()
    }

    /// Configured size; `0` means unbounded (Simple only).
    pub fn capacity(&self) -> usize {
        self.shared.store.read().capacity()
    }

    /// Stops the janitor, if one is running. Safe to call more than once.
    pub fn close(&self) {
        let janitor = self.shared.janitor.lock().take();
        if let Some(janitor) = janitor {
            janitor.stop();
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &*self.shared.store.read())
            .field("expiration", &self.shared.expiration)
            .field("stats", &self.shared.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::builder::CacheBuilder;
    use crate::clock::ManualClock;

    // ---------------------------------------------------------------------
    // Basic operations
    // ---------------------------------------------------------------------

    #[test]
    fn get_counts_hits_and_misses() {
        let cache = CacheBuilder::new(4).lru().build();
        cache.set(1, "one", Expiration::Default).unwrap();

        assert_eq!(cache.get(&1), Ok("one"));
        assert_eq!(cache.get(&1), Ok("one"));
        assert_eq!(cache.get(&1), Ok("one"));
        assert_eq!(cache.get(&2), Err(CacheError::KeyNotFound));

        assert_eq!(cache.hit_count(), 3);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.lookup_count(), 4);
        assert_eq!(cache.hit_rate(), 0.75);
    }

    #[test]
    fn has_does_not_touch_stats() {
        let cache = CacheBuilder::new(4).lfu().build();
        cache.set("k", 1, Expiration::Default).unwrap();
        assert!(cache.has(&"k"));
        assert!(!cache.has(&"missing"));
        assert_eq!(cache.lookup_count(), 0);
    }

    #[test]
    fn set_nx_rejects_live_key() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(4)
            .arc()
            .clock(Arc::new(clock.clone()))
            .build();

        cache.set_nx("k", 1, Duration::from_secs(1)).unwrap();
        assert_eq!(
            cache.set_nx("k", 2, Expiration::Default),
            Err(CacheError::KeyAlreadyExists)
        );
        assert_eq!(cache.get(&"k"), Ok(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.set_nx("k", 3, Expiration::Default), Ok(()));
        assert_eq!(cache.get(&"k"), Ok(3));
    }

    #[test]
    fn set_is_idempotent() {
        let cache = CacheBuilder::new(2).lru().build();
        cache.set("a", 1, Expiration::Default).unwrap();
        cache.set("a", 1, Expiration::Default).unwrap();
        assert_eq!(cache.len(false), 1);
        assert_eq!(cache.get(&"a"), Ok(1));
    }

    #[test]
    fn remove_reports_presence() {
        let cache = CacheBuilder::new(4).simple().build();
        cache.set(1, 10, Expiration::Default).unwrap();
        assert!(cache.remove(&1));
        assert!(!cache.remove(&1));
        assert_eq!(cache.get(&1), Err(CacheError::KeyNotFound));
    }

    // ---------------------------------------------------------------------
    // Expiration
    // ---------------------------------------------------------------------

    #[test]
    fn default_expiration_applies_to_default_sentinel() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(8)
            .lru()
            .expiration(Duration::from_secs(10))
            .clock(Arc::new(clock.clone()))
            .build();

        cache.set("default", 1, Expiration::Default).unwrap();
        cache.set("never", 2, Expiration::Never).unwrap();
        cache.set("short", 3, Duration::from_secs(1)).unwrap();

        clock.advance(Duration::from_secs(1));
        assert!(!cache.has(&"short"));
        assert!(cache.has(&"default"));

        clock.advance(Duration::from_secs(9));
        assert!(!cache.has(&"default"));
        assert!(cache.has(&"never"));
    }

    #[test]
    fn len_keys_and_get_all_filter_expired() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(8)
            .simple()
            .clock(Arc::new(clock.clone()))
            .build();
        cache.set(1, 1, Duration::from_secs(1)).unwrap();
        cache.set(2, 2, Expiration::Never).unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.len(false), 2);
        assert_eq!(cache.len(true), 1);
        assert_eq!(cache.keys(true), vec![2]);

        let mut all: Vec<_> = cache.get_all(false).into_iter().collect();
        all.sort();
        assert_eq!(all, vec![(1, 1), (2, 2)]);
        assert_eq!(cache.get_all(true).len(), 1);
    }

    // ---------------------------------------------------------------------
    // Callbacks
    // ---------------------------------------------------------------------

    #[test]
    fn callbacks_may_reenter_the_cache() {
        let handle: Arc<Mutex<Option<Cache<u32, u32>>>> = Arc::new(Mutex::new(None));
        let added = Arc::new(AtomicUsize::new(0));
        let evicted = Arc::new(Mutex::new(Vec::new()));

        let (h1, h2) = (handle.clone(), handle.clone());
        let (counter, sink) = (added.clone(), evicted.clone());
        let cache = CacheBuilder::new(1)
            .lru()
            .added(move |k: &u32, _: &u32| {
                // would deadlock if run under the store lock
                if let Some(cache) = h1.lock().clone() {
                    assert!(cache.has(k));
                }
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .evicted(move |k: &u32, v: &u32| {
                if let Some(cache) = h2.lock().clone() {
                    assert!(!cache.has(k));
                }
                sink.lock().push((*k, *v));
            })
            .build();
        *handle.lock() = Some(cache.clone());

        cache.set(1, 10, Expiration::Default).unwrap();
        cache.set(2, 20, Expiration::Default).unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 2);
        assert_eq!(*evicted.lock(), vec![(1, 10)]);

        handle.lock().take();
    }

    #[test]
    fn purge_runs_visitor_and_flush_does_not() {
        let clock = ManualClock::new();
        let purged = Arc::new(AtomicUsize::new(0));
        let evicted = Arc::new(AtomicUsize::new(0));
        let (p, e) = (purged.clone(), evicted.clone());
        let cache = CacheBuilder::new(8)
            .lfu()
            .clock(Arc::new(clock.clone()))
            .purge_visitor(move |_: &u32, _: &u32| {
                p.fetch_add(1, Ordering::SeqCst);
            })
            .evicted(move |_: &u32, _: &u32| {
                e.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        cache.set(1, 1, Duration::from_secs(1)).unwrap();
        cache.set(2, 2, Duration::from_secs(1)).unwrap();
        cache.set(3, 3, Expiration::Never).unwrap();

        clock.advance(Duration::from_secs(1));
        cache.purge();
        assert_eq!(purged.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(false), 1);

        cache.flush();
        assert!(cache.is_empty());
        assert_eq!(evicted.load(Ordering::SeqCst), 0);
    }

    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    #[test]
    fn loader_fills_miss_and_counts_it() {
        let cache = CacheBuilder::new(4)
            .lru()
            .loader(|k: &u32| Ok(k * 2))
            .build();

        assert_eq!(cache.get(&21), Ok(42));
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.get(&21), Ok(42));
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn loader_error_reports_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache: Cache<u32, u32> = CacheBuilder::new(4)
            .lru()
            .loader(move |k: &u32| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("backend down".into())
                } else {
                    Ok(k + 1)
                }
            })
            .build();

        let err = cache.get(&1).unwrap_err();
        assert_eq!(err, CacheError::KeyNotFound);
        assert!(err.is_not_found());
        assert!(!cache.has(&1));

        // Failures are not cached; the next miss loads again.
        assert_eq!(cache.get(&1), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn loader_with_expiration_sets_ttl() {
        let clock = ManualClock::new();
        let cache = CacheBuilder::new(4)
            .lru()
            .expiration(Duration::from_secs(100))
            .clock(Arc::new(clock.clone()))
            .loader_with_expiration(|k: &u32| {
                let ttl = (*k == 1).then(|| Duration::from_secs(1));
                Ok((*k, ttl))
            })
            .build();

        assert_eq!(cache.get(&1), Ok(1));
        assert_eq!(cache.get(&2), Ok(2));
        clock.advance(Duration::from_secs(1));
        assert!(!cache.has(&1));
        assert!(cache.has(&2));
    }

    #[test]
    fn close_is_idempotent_without_janitor() {
        let cache: Cache<u32, u32> = CacheBuilder::new(4).build();
        cache.close();
        cache.close();
        assert_eq!(cache.policy(), CachePolicy::Lru);
        assert_eq!(cache.capacity(), 4);
    }
}
