//! Single-flight loading.
//!
//! A [`LoadGroup`] makes sure that at most one loader runs per key at a time.
//! Every caller that misses on the same key while a load is in flight either
//! waits for that load's result or, for non-waiting callers, returns
//! immediately with [`CacheError::KeyNotFound`].
//!
//! ```text
//!   load(key, recheck, fill, wait)
//!     │
//!     ├─ lock calls
//!     │    ├─ recheck() hits        ──► Ok(value)             (no loader)
//!     │    ├─ call in flight, wait  ──► block on call.done    ──► shared result
//!     │    ├─ call in flight, !wait ──► Err(KeyNotFound)
//!     │    └─ no call               ──► register Call
//!     ├─ unlock calls
//!     ├─ wait  ──► run fill() inline, publish, return result
//!     └─ !wait ──► run fill() on a loader thread, Err(KeyNotFound)
//! ```
//!
//! `fill` is expected to store the loaded value before it returns, so a
//! caller arriving after the call is unregistered finds it through `recheck`.
//! The group lock is always taken before the store lock.

use std::any::Any;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use log::error;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// One in-flight load shared by every caller that asked for the same key.
struct Call<V> {
    result: Mutex<Option<Result<V, CacheError>>>,
    done: Condvar,
}

impl<V: Clone> Call<V> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<V, CacheError>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<V, CacheError> {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut guard);
        }
    }
}

/// Deduplicates concurrent loads per key.
pub(crate) struct LoadGroup<K, V> {
    calls: Mutex<FxHashMap<K, Arc<Call<V>>>>,
}

impl<K, V> LoadGroup<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(FxHashMap::default()),
        }
    }

    /// Number of loads currently registered.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the value for `key`, loading it through `fill` at most once
    /// across concurrent callers.
    ///
    /// `recheck` runs under the group lock and must not record statistics.
    pub(crate) fn load<P, F>(
        self: &Arc<Self>,
        key: &K,
        recheck: P,
        fill: F,
        wait: bool,
    ) -> Result<V, CacheError>
    where
        P: FnOnce() -> Option<V>,
        F: FnOnce() -> Result<V, CacheError> + Send + 'static,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(value) = recheck() {
                return Ok(value);
            }
            if let Some(call) = calls.get(key) {
                let call = Arc::clone(call);
                drop(calls);
                return if wait {
                    call.wait()
                } else {
                    Err(CacheError::KeyNotFound)
                };
            }
            let call = Arc::new(Call::new());
            calls.insert(key.clone(), Arc::clone(&call));
            call
        };

        if wait {
            return self.run(key, &call, fill);
        }

        let group = Arc::clone(self);
        let owned = key.clone();
        let pending = Arc::clone(&call);
        let spawned = thread::Builder::new()
            .name("polycache-loader".into())
            .spawn(move || {
                let _ = group.run(&owned, &pending, fill);
            });
        if let Err(err) = spawned {
            error!("failed to spawn loader thread: {err}");
            self.finish(key, &call, Err(CacheError::KeyNotFound));
        }
        Err(CacheError::KeyNotFound)
    }

    fn run<F>(&self, key: &K, call: &Call<V>, fill: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Result<V, CacheError>,
    {
        let result = match panic::catch_unwind(AssertUnwindSafe(fill)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("loader panicked: {message}");
                Err(CacheError::LoaderPanic(message))
            },
        };
        self.finish(key, call, result.clone());
        result
    }

    fn finish(&self, key: &K, call: &Call<V>, result: Result<V, CacheError>) {
        call.complete(result);
        self.calls.lock().remove(key);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
